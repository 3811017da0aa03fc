//! Delay and cancellation policy deciding what time a departure shows.

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;

use crate::model::{BoardEntry, CanonicalDeparture};

/// Smallest delay, in seconds, that is annotated on the board.
pub const VISIBLE_DELAY_SECONDS: i64 = 60;

/// How a departure's time should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDisplay {
    /// Show the scheduled time only.
    OnTime {
        /// Planned departure.
        scheduled: DateTime<Tz>,
    },
    /// Show the realtime estimate prominently and the scheduled time struck through.
    Delayed {
        /// Realtime estimate.
        realtime: DateTime<Tz>,
        /// Planned departure.
        scheduled: DateTime<Tz>,
    },
}

/// Difference between the realtime estimate and the schedule, if the feed reported one.
#[must_use]
pub fn delay(departure: &CanonicalDeparture) -> Option<TimeDelta> {
    departure
        .realtime_time
        .map(|realtime| realtime - departure.scheduled_time)
}

/// Whether the delay is large enough to annotate.
///
/// Early running and delays under a minute are never shown.
#[must_use]
pub fn has_visible_delay(departure: &CanonicalDeparture) -> bool {
    delay(departure).is_some_and(|late| late >= TimeDelta::seconds(VISIBLE_DELAY_SECONDS))
}

/// Instant used for windowing and display: realtime when known, else scheduled.
#[must_use]
pub fn display_time(departure: &CanonicalDeparture) -> DateTime<Tz> {
    departure.realtime_time.unwrap_or(departure.scheduled_time)
}

/// Presentation decision for renderers.
#[must_use]
pub fn time_display(departure: &CanonicalDeparture) -> TimeDisplay {
    match departure.realtime_time {
        Some(realtime) if has_visible_delay(departure) => TimeDisplay::Delayed {
            realtime,
            scheduled: departure.scheduled_time,
        },
        _ => TimeDisplay::OnTime {
            scheduled: departure.scheduled_time,
        },
    }
}

impl CanonicalDeparture {
    /// See [`has_visible_delay`].
    #[must_use]
    pub fn has_visible_delay(&self) -> bool {
        has_visible_delay(self)
    }

    /// See [`display_time`].
    #[must_use]
    pub fn display_time(&self) -> DateTime<Tz> {
        display_time(self)
    }
}

impl BoardEntry {
    /// See [`has_visible_delay`].
    #[must_use]
    pub fn has_visible_delay(&self) -> bool {
        has_visible_delay(&self.departure)
    }

    /// See [`time_display`].
    #[must_use]
    pub fn time_display(&self) -> TimeDisplay {
        time_display(&self.departure)
    }
}
