//! Departure board merging neighbouring stops into one list, shown in the
//! terminal or printed once as an HTML page.

mod app;
mod html;
mod input;
mod ui;

use std::{
    fs::{self, File},
    io::{self, Write as _},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use abfahrten_core::{BoardConfig, BoardService, ProviderRegistry};
use abfahrten_provider_dbrest as dbrest;
use abfahrten_provider_hafas as hafas;
use anyhow::{Context as _, Result};
use askama::Template as _;
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::html::BoardPage;
use crate::input::Action;

/// Read when `--config` is not given, if present.
const DEFAULT_CONFIG: &str = "abfahrten.toml";

#[derive(Debug, Parser)]
#[command(version, about = "Merged departure board for neighbouring stops")]
struct Args {
    /// TOML configuration file; built-in defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the board once as HTML to stdout and exit.
    #[arg(long)]
    html: bool,

    /// Seconds between automatic refreshes of the terminal board.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    refresh: u64,

    /// Log destination while the terminal board is shown.
    #[arg(long, default_value = "abfahrten.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = load_config(args.config.as_deref())?;
    let service = Arc::new(build_service(&config)?);

    if args.html {
        return print_html(&service).await;
    }

    let app = App::new(service, StdDuration::from_secs(args.refresh));

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // The terminal board owns the screen, so logs go to a file there.
    if args.html {
        builder.with_writer(io::stderr).init();
    } else {
        let file = File::create(&args.log_file)
            .with_context(|| format!("cannot open log file {}", args.log_file.display()))?;
        builder.with_writer(Mutex::new(file)).with_ansi(false).init();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BoardConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => {
            info!("no configuration file, using built-in defaults");
            return Ok(BoardConfig::default());
        }
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn build_service(config: &BoardConfig) -> Result<BoardService> {
    let client = Client::builder()
        .user_agent(concat!("abfahrten/", env!("CARGO_PKG_VERSION")))
        .timeout(StdDuration::from_secs(20))
        .build()?;
    let normalizer = Arc::new(config.normalizer()?);

    let plugins = vec![
        hafas::plugin(
            client.clone(),
            Arc::clone(&normalizer),
            config.base_url("gvh"),
        ),
        dbrest::plugin(
            client,
            normalizer,
            config.timezone,
            config.base_url("dbrest"),
        ),
    ];
    let registry = Arc::new(ProviderRegistry::new(plugins));

    Ok(BoardService::new(registry, config)?)
}

async fn print_html(service: &BoardService) -> Result<()> {
    let board = service.board_now().await;
    let page = BoardPage::new(&board).render()?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{page}")?;
    Ok(())
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        if app.refresh_due() {
            app.is_loading = true;
            terminal.draw(|frame| ui::draw(frame, &app))?;

            let board = app.service.board_now().await;
            app.show(board);
        }

        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            match input::handle_key_event(key, &mut app) {
                Action::Quit => break,
                Action::Refresh => app.request_refresh(),
                Action::None => {}
            }
        }
    }

    Ok(())
}
