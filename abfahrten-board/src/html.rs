//! Static HTML rendering of a board.

use askama::Template;
use chrono::DateTime;
use chrono_tz::Tz;

use abfahrten_core::{Board, BoardEntry, TimeDisplay};

/// `HH:MM` in the timestamp's own timezone.
pub(crate) fn clock(time: DateTime<Tz>) -> String {
    time.format("%H:%M").to_string()
}

pub(crate) struct RowView {
    pub(crate) line: String,
    pub(crate) direction: String,
    pub(crate) time: String,
    pub(crate) scheduled: String,
    pub(crate) delayed: bool,
    pub(crate) stop: String,
}

impl From<&BoardEntry> for RowView {
    fn from(entry: &BoardEntry) -> Self {
        let (time, scheduled, delayed) = match entry.time_display() {
            TimeDisplay::OnTime { scheduled } => (clock(scheduled), clock(scheduled), false),
            TimeDisplay::Delayed {
                realtime,
                scheduled,
            } => (clock(realtime), clock(scheduled), true),
        };

        Self {
            line: entry.departure.line.clone(),
            direction: entry.departure.direction.clone(),
            time,
            scheduled,
            delayed,
            stop: entry.departure.stop_name.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "board.html")]
pub(crate) struct BoardPage {
    generated: String,
    rows: Vec<RowView>,
    unavailable: Vec<String>,
}

impl BoardPage {
    pub(crate) fn new(board: &Board) -> Self {
        Self {
            generated: clock(board.window.start),
            rows: board.entries.iter().map(RowView::from).collect(),
            unavailable: board
                .unavailable
                .iter()
                .map(|source| source.source_id.to_string())
                .collect(),
        }
    }
}
