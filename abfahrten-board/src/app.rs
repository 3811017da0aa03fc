use std::sync::Arc;
use std::time::{Duration, Instant};

use abfahrten_core::{Board, BoardService};

pub(crate) struct App {
    pub(crate) service: Arc<BoardService>,

    pub(crate) board: Option<Board>,
    pub(crate) scroll: usize,

    pub(crate) refresh_interval: Duration,
    pub(crate) last_refresh: Option<Instant>,
    pub(crate) is_loading: bool,
}

impl App {
    pub(crate) fn new(service: Arc<BoardService>, refresh_interval: Duration) -> Self {
        Self {
            service,
            board: None,
            scroll: 0,
            refresh_interval,
            last_refresh: None,
            is_loading: false,
        }
    }

    /// Whether the board is missing or older than the refresh interval.
    pub(crate) fn refresh_due(&self) -> bool {
        self.last_refresh
            .is_none_or(|at| at.elapsed() >= self.refresh_interval)
    }

    pub(crate) fn request_refresh(&mut self) {
        self.last_refresh = None;
    }

    pub(crate) fn show(&mut self, board: Board) {
        let rows = board.entries.len();
        self.board = Some(board);
        self.scroll = self.scroll.min(rows.saturating_sub(1));
        self.last_refresh = Some(Instant::now());
        self.is_loading = false;
    }

    pub(crate) fn row_count(&self) -> usize {
        self.board.as_ref().map_or(0, |board| board.entries.len())
    }

    pub(crate) fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub(crate) fn scroll_down(&mut self) {
        if self.scroll + 1 < self.row_count() {
            self.scroll += 1;
        }
    }
}
