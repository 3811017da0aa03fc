use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};

use abfahrten_core::{Board, BoardEntry, TimeDisplay};

use crate::app::App;
use crate::html::clock;

const NAV_HINT: &str = "r refresh · ↑/↓ scroll · q/Ctrl-C quit";

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, board, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let sources = app
        .service
        .sources()
        .iter()
        .map(|source| source.stop.as_str())
        .collect::<Vec<_>>()
        .join(" + ");
    let updated = app
        .board
        .as_ref()
        .map_or_else(|| "never".to_owned(), |board| clock(board.window.start));
    let header = Paragraph::new(format!("{sources} · updated {updated}"))
        .block(Block::default().borders(Borders::ALL).title("Abfahrten"));
    frame.render_widget(header, *header_area);

    match &app.board {
        Some(board) => draw_board(frame, app, board, *content_area),
        None => {
            let paragraph = Paragraph::new("Loading departures…")
                .block(Block::default().borders(Borders::ALL))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, *content_area);
        }
    }

    let unavailable = app
        .board
        .as_ref()
        .filter(|board| !board.is_complete())
        .map(unavailable_summary);

    let status_text = if app.is_loading {
        format!("Loading… · {NAV_HINT}")
    } else if let Some(summary) = &unavailable {
        format!("{summary} · {NAV_HINT}")
    } else {
        NAV_HINT.to_owned()
    };

    let status_style = if unavailable.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_board(frame: &mut Frame<'_>, app: &App, board: &Board, area: Rect) {
    let title = format!(
        "Departures {} – {}",
        clock(board.window.start),
        clock(board.window.end)
    );

    if board.entries.is_empty() {
        let paragraph = Paragraph::new("No departures in the window.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = board.entries.iter().map(|entry| {
        Row::new(vec![
            Cell::from(Line::from(entry.departure.line.as_str()).right_aligned())
                .style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from(entry.departure.direction.as_str()),
            Cell::from(time_line(entry)),
            Cell::from(stop_label(entry)).style(Style::default().fg(Color::DarkGray)),
        ])
    });

    let column_widths = [
        Constraint::Length(5),
        Constraint::Min(20),
        Constraint::Length(12),
        Constraint::Min(16),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Line", "Direction", "Time", "Stop"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    let mut state = TableState::default().with_offset(app.scroll);
    frame.render_stateful_widget(table, area, &mut state);
}

/// Realtime in yellow next to the struck-through schedule when late.
fn time_line(entry: &BoardEntry) -> Line<'static> {
    match entry.time_display() {
        TimeDisplay::OnTime { scheduled } => Line::from(clock(scheduled)),
        TimeDisplay::Delayed {
            realtime,
            scheduled,
        } => Line::from(vec![
            Span::styled(clock(realtime), Style::default().fg(Color::Yellow)),
            Span::raw(" "),
            Span::styled(
                clock(scheduled),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT),
            ),
        ]),
    }
}

fn stop_label(entry: &BoardEntry) -> String {
    match &entry.departure.platform {
        Some(platform) => format!("{} ({platform})", entry.departure.stop_name),
        None => entry.departure.stop_name.clone(),
    }
}

fn unavailable_summary(board: &Board) -> String {
    let sources = board
        .unavailable
        .iter()
        .map(|source| format!("{} ({})", source.source_id, source.error))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Unavailable: {sources}")
}
