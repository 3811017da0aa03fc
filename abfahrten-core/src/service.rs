//! High-level service producing a departure board from all configured sources.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::aggregate::{BoardWindow, SourceBatch, aggregate};
use crate::config::{BoardConfig, ConfigError, ConfiguredSource};
use crate::filter::DepartureFilter;
use crate::model::{BoardEntry, CanonicalDeparture, SourceId};
use crate::plugin::ProviderRegistry;
use crate::ports::{DepartureQuery, PortError};

#[derive(thiserror::Error, Debug)]
#[error("source {source_id} unavailable: {error}")]
/// A source whose feed could not be fetched; it contributed nothing to the board.
pub struct SourceUnavailable {
    /// Affected source.
    pub source_id: SourceId,
    /// Why the fetch failed.
    #[source]
    pub error: PortError,
}

#[derive(Debug)]
/// Result of one board computation.
pub struct Board {
    /// Deduplicated entries ordered by merge key.
    pub entries: Vec<BoardEntry>,
    /// Sources that failed and were treated as empty.
    pub unavailable: Vec<SourceUnavailable>,
    /// Window the entries were selected from.
    pub window: BoardWindow,
}

impl Board {
    /// Whether every source answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }
}

/// Public entry point computing boards from the configured sources.
pub struct BoardService {
    registry: Arc<ProviderRegistry>,
    sources: Vec<ConfiguredSource>,
    lookahead: TimeDelta,
    timezone: Tz,
}

impl BoardService {
    /// Create a service for `config`, validated against `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is inconsistent with the registry.
    pub fn new(registry: Arc<ProviderRegistry>, config: &BoardConfig) -> Result<Self, ConfigError> {
        let sources = config.compile_sources(&registry)?;
        Ok(Self {
            registry,
            sources,
            lookahead: config.lookahead(),
            timezone: config.timezone,
        })
    }

    /// Configured sources in merge order.
    #[must_use]
    pub fn sources(&self) -> &[ConfiguredSource] {
        &self.sources
    }

    /// Timezone of all board timestamps.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Compute the board for the current time.
    pub async fn board_now(&self) -> Board {
        self.board(Utc::now().with_timezone(&self.timezone)).await
    }

    /// Compute the board as seen at `reference_time`.
    ///
    /// All sources are fetched concurrently. A source that fails is logged,
    /// reported in [`Board::unavailable`] and contributes no departures.
    pub async fn board(&self, reference_time: DateTime<Tz>) -> Board {
        let query = DepartureQuery::new(reference_time, self.lookahead);
        let window = BoardWindow::new(reference_time, self.lookahead);

        let fetched = join_all(
            self.sources
                .iter()
                .map(|source| self.fetch_source(source, &query)),
        )
        .await;

        let mut unavailable = Vec::new();
        let mut batches = Vec::with_capacity(self.sources.len());

        for (source, result) in self.sources.iter().zip(fetched) {
            let departures = match result {
                Ok(departures) => departures,
                Err(error) => {
                    warn!(source = %source.id, %error, "source unavailable, continuing without it");
                    unavailable.push(SourceUnavailable {
                        source_id: source.id.clone(),
                        error,
                    });
                    Vec::new()
                }
            };

            let mut batch = SourceBatch::new(source.id.clone(), departures);
            if let Some(filter) = &source.filter {
                batch = batch.with_filter(filter as &dyn DepartureFilter);
            }
            batches.push(batch);
        }

        let entries = aggregate(batches, &window);
        info!(
            entries = entries.len(),
            unavailable = unavailable.len(),
            "board computed"
        );

        Board {
            entries,
            unavailable,
            window,
        }
    }

    async fn fetch_source(
        &self,
        source: &ConfiguredSource,
        query: &DepartureQuery,
    ) -> Result<Vec<CanonicalDeparture>, PortError> {
        let port = &self.registry.plugin(&source.provider)?.departure_port;
        let stop = port.resolve_stop(&source.stop).await?;
        debug!(source = %source.id, stop_id = %stop.id, stop_name = %stop.name, "resolved stop");

        let departures = port.departures(&stop, query).await?;
        debug!(source = %source.id, count = departures.len(), "fetched departures");
        Ok(departures)
    }
}
