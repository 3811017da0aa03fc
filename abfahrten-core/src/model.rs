//! Domain data structures for sources, stops, and departures.

use std::fmt;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a configured source, i.e. one monitored stop on one backend.
pub struct SourceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        SourceId(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a backend provider such as `gvh` or `dbrest`.
pub struct ProviderId(pub String);

impl fmt::Display for ProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        ProviderId(id.to_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a backend and its human-friendly name.
pub struct ProviderMeta {
    /// Unique identifier referenced from the configuration.
    pub id: ProviderId,
    /// Display name of the transit authority or service.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Stop as resolved by a backend.
pub struct StopRef {
    /// Backend-specific identifier used when requesting departures.
    pub id: String,
    /// Name reported by the backend.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A departure normalized from any feed.
pub struct CanonicalDeparture {
    /// Stop label with city decorations removed.
    pub stop_name: String,
    /// Platform label, when the feed reports one.
    pub platform: Option<String>,
    /// Line label as shown to riders, vehicle-type prefix removed.
    pub line: String,
    /// Digits of the original line label, used for merging and ordering.
    pub line_number: u32,
    /// Destination text with city decorations removed.
    pub direction: String,
    /// Planned departure instant.
    pub scheduled_time: DateTime<Tz>,
    /// Realtime estimate, present only when the feed reports one.
    pub realtime_time: Option<DateTime<Tz>>,
    /// Whether the trip is cancelled at this stop.
    pub cancelled: bool,
}

impl CanonicalDeparture {
    /// Key under which this departure is merged with observations from other feeds.
    #[must_use]
    pub fn merge_key(&self) -> MergeKey {
        MergeKey::new(self.scheduled_time, self.line_number)
    }
}

/// Identity of a physical trip across feeds: scheduled minute plus line number.
///
/// Orders by minute first, then by line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MergeKey {
    minute: DateTime<Tz>,
    line_number: u32,
}

impl MergeKey {
    /// Build a key, truncating `scheduled` to the start of its minute.
    #[must_use]
    pub fn new(scheduled: DateTime<Tz>, line_number: u32) -> Self {
        let past_minute = TimeDelta::seconds(scheduled.timestamp().rem_euclid(60))
            + TimeDelta::nanoseconds(i64::from(scheduled.timestamp_subsec_nanos()));
        Self {
            minute: scheduled - past_minute,
            line_number,
        }
    }

    /// Scheduled time truncated to the minute.
    #[must_use]
    pub fn minute(&self) -> DateTime<Tz> {
        self.minute
    }

    /// Numeric line number.
    #[must_use]
    pub fn line_number(&self) -> u32 {
        self.line_number
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}-{:03}",
            self.minute.format("%Y-%m-%d-%H-%M"),
            self.line_number
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A departure placed on the board.
pub struct BoardEntry {
    /// Source whose observation won the merge.
    pub source: SourceId,
    /// The departure itself.
    pub departure: CanonicalDeparture,
    /// Instant shown on the board, see [`crate::delay::display_time`].
    pub display_time: DateTime<Tz>,
}

impl BoardEntry {
    /// Merge key of the underlying departure.
    #[must_use]
    pub fn key(&self) -> MergeKey {
        self.departure.merge_key()
    }
}
