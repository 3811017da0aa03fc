//! Merging of per-source departures into one deduplicated, ordered board.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::delay::display_time;
use crate::filter::DepartureFilter;
use crate::model::{BoardEntry, CanonicalDeparture, MergeKey, SourceId};

/// Lookahead of the original board.
pub const DEFAULT_WINDOW_MINUTES: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open interval `[start, end)` of display times kept on the board.
pub struct BoardWindow {
    /// Reference time, usually now.
    pub start: DateTime<Tz>,
    /// Cutoff; departures displayed at or after it are dropped.
    pub end: DateTime<Tz>,
}

impl BoardWindow {
    /// Window from `reference_time` spanning `lookahead`.
    #[must_use]
    pub fn new(reference_time: DateTime<Tz>, lookahead: TimeDelta) -> Self {
        Self {
            start: reference_time,
            end: reference_time + lookahead,
        }
    }

    /// Whether `time` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, time: DateTime<Tz>) -> bool {
        self.start <= time && time < self.end
    }
}

/// Departures reported by one source, with its optional filter.
pub struct SourceBatch<'filter> {
    /// Source the departures came from.
    pub source: SourceId,
    /// Normalized departures in feed order.
    pub departures: Vec<CanonicalDeparture>,
    /// Exclusion predicate for this source; `None` keeps everything.
    pub filter: Option<&'filter dyn DepartureFilter>,
}

impl<'filter> SourceBatch<'filter> {
    /// Batch without a filter.
    #[must_use]
    pub fn new(source: SourceId, departures: Vec<CanonicalDeparture>) -> Self {
        Self {
            source,
            departures,
            filter: None,
        }
    }

    /// Attach a filter to the batch.
    #[must_use]
    pub fn with_filter(mut self, filter: &'filter dyn DepartureFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Merge batches into the final board.
///
/// Batches are processed in the given order. Cancelled, filtered and
/// out-of-window departures are skipped. Departures sharing a
/// [`MergeKey`] collapse into one entry; the last one processed wins.
/// The result is ordered by ascending key.
#[must_use]
pub fn aggregate<'filter, I>(batches: I, window: &BoardWindow) -> Vec<BoardEntry>
where
    I: IntoIterator<Item = SourceBatch<'filter>>,
{
    let mut board = BTreeMap::<MergeKey, BoardEntry>::new();

    for batch in batches {
        let SourceBatch {
            source,
            departures,
            filter,
        } = batch;
        let received = departures.len();
        let mut kept = 0_usize;

        for departure in departures {
            if departure.cancelled {
                continue;
            }
            if filter.is_some_and(|filter| !filter.include_in_board(&departure)) {
                continue;
            }
            let shown_at = display_time(&departure);
            if !window.contains(shown_at) {
                continue;
            }

            let key = departure.merge_key();
            let entry = BoardEntry {
                source: source.clone(),
                departure,
                display_time: shown_at,
            };
            if let Some(replaced) = board.insert(key, entry) {
                trace!(%key, replaced = %replaced.source, by = %source, "merge key overwritten");
            }
            kept += 1;
        }

        debug!(%source, received, kept, "merged source");
    }

    board.into_values().collect()
}
