//! Traits describing feed adapters and fetch backends, plus their error types.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use chrono_tz::Tz;
use reqwest::Error as ReqwestError;
use tracing::warn;

use crate::model::{CanonicalDeparture, ProviderId, ProviderMeta, StopRef};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a feed backend.
pub enum PortError {
    /// Network layer or HTTP status failure, including undecodable bodies.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Backend answered, but reported an error of its own.
    #[error("Backend error {code}: {message}")]
    Backend {
        /// Error code as reported by the backend.
        code: String,
        /// Human readable explanation, possibly empty.
        message: String,
    },
    /// The stop query matched no stop.
    #[error("Stop not found: {0}")]
    StopNotFound(String),
    /// No provider is registered under this identifier.
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderId),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// A single feed record that cannot be turned into a [`CanonicalDeparture`].
pub enum MalformedRecord {
    /// Line label contains no digits, so no line number can be derived.
    #[error("line label {0:?} contains no digits")]
    NoLineNumber(String),
    /// Line label digits do not fit a line number.
    #[error("line number in {0:?} is out of range")]
    LineNumberOutOfRange(String),
    /// A required field is absent.
    #[error("missing field {0}")]
    MissingField(&'static str),
    /// A timestamp field could not be parsed.
    #[error("invalid timestamp {value:?} in {field}")]
    InvalidTime {
        /// Name of the offending field.
        field: &'static str,
        /// Raw field content.
        value: String,
    },
    /// A wall-clock time falls into a daylight saving gap.
    #[error("local time {0} does not exist in {1}")]
    NonexistentLocalTime(NaiveDateTime, Tz),
    /// The record does not have the backend's record shape at all.
    #[error("undecodable record: {0}")]
    Undecodable(String),
}

/// Conversion of one backend's raw records into canonical departures.
///
/// Adapters are pure: no I/O and no state beyond their configuration.
pub trait FeedAdapter {
    /// Backend-specific record shape.
    type Raw;

    /// Convert one raw record.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecord`] when a required field is missing or unusable.
    fn normalize(&self, raw: &Self::Raw) -> Result<CanonicalDeparture, MalformedRecord>;

    /// Convert a batch, dropping and logging malformed records.
    fn normalize_all(&self, records: &[Self::Raw]) -> Vec<CanonicalDeparture> {
        drop_malformed(records.iter().map(|raw| self.normalize(raw)))
    }

    /// Convert records that were decoded one by one; decode failures are
    /// dropped and logged like any other malformed record.
    fn normalize_decoded<I>(&self, records: I) -> Vec<CanonicalDeparture>
    where
        I: IntoIterator<Item = Result<Self::Raw, MalformedRecord>>,
    {
        drop_malformed(
            records
                .into_iter()
                .map(|record| record.and_then(|raw| self.normalize(&raw))),
        )
    }
}

/// Keep the converted departures, logging every malformed record at `warn`.
pub fn drop_malformed<I>(results: I) -> Vec<CanonicalDeparture>
where
    I: IntoIterator<Item = Result<CanonicalDeparture, MalformedRecord>>,
{
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| match result {
            Ok(departure) => Some(departure),
            Err(err) => {
                warn!(index, error = %err, "dropping malformed feed record");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
/// Parameters of a departure request.
pub struct DepartureQuery {
    /// Current time; departures are requested from here on.
    pub reference_time: DateTime<Tz>,
    /// How far ahead the board looks.
    pub lookahead: TimeDelta,
    /// Upper bound on the number of departures requested per stop.
    pub max_results: usize,
}

impl DepartureQuery {
    /// Number of trips requested per stop, as in the original board.
    pub const DEFAULT_MAX_RESULTS: usize = 40;

    /// Query starting at `reference_time` looking `lookahead` ahead.
    #[must_use]
    pub fn new(reference_time: DateTime<Tz>, lookahead: TimeDelta) -> Self {
        Self {
            reference_time,
            lookahead,
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    /// Lookahead in whole minutes, never negative.
    #[must_use]
    pub fn lookahead_minutes(&self) -> i64 {
        self.lookahead.num_minutes().max(0)
    }
}

#[async_trait]
/// Trait for backend-specific departure feeds.
pub trait DeparturePort: Send + Sync {
    /// Metadata describing the backend.
    fn provider(&self) -> &ProviderMeta;

    /// Resolve a configured stop name or identifier to a backend stop.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the lookup fails or finds nothing.
    async fn resolve_stop(&self, query: &str) -> Result<StopRef, PortError>;

    /// Fetch and normalize upcoming departures at a stop.
    ///
    /// Malformed records are dropped, never reported as an error.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend cannot be reached or rejects the request.
    async fn departures(
        &self,
        stop: &StopRef,
        query: &DepartureQuery,
    ) -> Result<Vec<CanonicalDeparture>, PortError>;
}
