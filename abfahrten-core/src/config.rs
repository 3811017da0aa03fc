//! Board configuration as plain data, with validation into runtime sources.

use std::collections::{BTreeMap, HashSet};

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_WINDOW_MINUTES;
use crate::filter::{ExclusionRule, FilterError, SourceFilter};
use crate::model::{ProviderId, SourceId};
use crate::normalize::{DEFAULT_CITY, DEFAULT_LINE_PREFIXES, Normalizer};
use crate::plugin::ProviderRegistry;

#[derive(thiserror::Error, Debug)]
/// Errors detected while validating a [`BoardConfig`].
pub enum ConfigError {
    /// A source references a provider that is not registered.
    #[error("source {source_id} uses unknown provider {provider}")]
    UnknownProvider {
        /// Offending source.
        source_id: SourceId,
        /// Provider it asked for.
        provider: ProviderId,
    },
    /// Two sources share an identifier.
    #[error("duplicate source id {0}")]
    DuplicateSource(SourceId),
    /// An exclusion rule of a source is invalid.
    #[error("invalid exclusion rule for source {source_id}: {error}")]
    Filter {
        /// Offending source.
        source_id: SourceId,
        /// Underlying rule error.
        #[source]
        error: FilterError,
    },
    /// The lookahead window is empty.
    #[error("window_minutes must be positive")]
    ZeroWindow,
    /// The city or line prefixes do not form valid patterns.
    #[error("invalid normalization settings: {0}")]
    Normalization(#[from] regex::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Complete board configuration.
pub struct BoardConfig {
    /// Timezone every timestamp is expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Lookahead of the board in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
    /// Home city stripped from stop names and directions.
    #[serde(default = "default_city")]
    pub city: String,
    /// Vehicle-type tags stripped from line labels.
    #[serde(default = "default_line_prefixes")]
    pub line_prefixes: Vec<String>,
    /// Per-provider settings, keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
    /// Monitored stops, in merge order. Later sources win merge conflicts.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Endpoint overrides for a provider.
pub struct ProviderSettings {
    /// Replacement base URL.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// One monitored stop on one backend.
pub struct SourceConfig {
    /// Unique source identifier.
    pub id: SourceId,
    /// Backend to query.
    pub provider: ProviderId,
    /// Stop name to search for, or a backend stop identifier.
    pub stop: String,
    /// Departures to keep off the board for this source.
    #[serde(default)]
    pub exclude: Vec<ExclusionRuleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// Patterns of one exclusion rule; all given patterns must match.
pub struct ExclusionRuleConfig {
    /// Pattern for the normalized line label.
    pub line: Option<String>,
    /// Pattern for the normalized direction.
    pub direction: Option<String>,
    /// Pattern for the normalized stop name.
    pub stop: Option<String>,
}

impl TryFrom<&ExclusionRuleConfig> for ExclusionRule {
    type Error = FilterError;

    fn try_from(rule: &ExclusionRuleConfig) -> Result<Self, Self::Error> {
        ExclusionRule::new(
            rule.line.as_deref(),
            rule.direction.as_deref(),
            rule.stop.as_deref(),
        )
    }
}

/// A validated source ready to be queried.
#[derive(Debug, Clone)]
pub struct ConfiguredSource {
    /// Source identifier.
    pub id: SourceId,
    /// Backend to query.
    pub provider: ProviderId,
    /// Stop query passed to the backend.
    pub stop: String,
    /// Compiled exclusion rules; `None` when the source has none.
    pub filter: Option<SourceFilter>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            window_minutes: default_window_minutes(),
            city: default_city(),
            line_prefixes: default_line_prefixes(),
            providers: BTreeMap::new(),
            sources: default_sources(),
        }
    }
}

impl BoardConfig {
    /// Lookahead window as a duration.
    #[must_use]
    pub fn lookahead(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.window_minutes))
    }

    /// Base URL override for a provider, if configured.
    #[must_use]
    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|settings| settings.base_url.as_deref())
    }

    /// Label normalizer for the configured city and prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Normalization`] if the settings do not form valid patterns.
    pub fn normalizer(&self) -> Result<Normalizer, ConfigError> {
        Ok(Normalizer::new(&self.city, &self.line_prefixes)?)
    }

    /// Validate against the registered providers and compile the filters.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty window, duplicate source ids,
    /// unknown providers or invalid exclusion rules.
    pub fn compile_sources(
        &self,
        registry: &ProviderRegistry,
    ) -> Result<Vec<ConfiguredSource>, ConfigError> {
        if self.window_minutes == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            if !seen.insert(&source.id) {
                return Err(ConfigError::DuplicateSource(source.id.clone()));
            }
            if !registry.contains(&source.provider) {
                return Err(ConfigError::UnknownProvider {
                    source_id: source.id.clone(),
                    provider: source.provider.clone(),
                });
            }

            let rules = source
                .exclude
                .iter()
                .map(ExclusionRule::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| ConfigError::Filter {
                    source_id: source.id.clone(),
                    error,
                })?;

            sources.push(ConfiguredSource {
                id: source.id.clone(),
                provider: source.provider.clone(),
                stop: source.stop.clone(),
                filter: (!rules.is_empty()).then(|| SourceFilter::new(rules)),
            });
        }

        Ok(sources)
    }
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::Berlin
}

fn default_window_minutes() -> u32 {
    DEFAULT_WINDOW_MINUTES
}

fn default_city() -> String {
    DEFAULT_CITY.to_owned()
}

fn default_line_prefixes() -> Vec<String> {
    DEFAULT_LINE_PREFIXES.map(str::to_owned).to_vec()
}

/// The two stops of the original board: trams from Bahnstrift towards
/// Alte Heide already show up at Alte Heide, and lines 2 and 135 at
/// Alte Heide duplicate what Bahnstrift reports.
fn default_sources() -> Vec<SourceConfig> {
    let line = |pattern: &str| ExclusionRuleConfig {
        line: Some(pattern.to_owned()),
        ..ExclusionRuleConfig::default()
    };

    vec![
        SourceConfig {
            id: SourceId::from("bahnstrift"),
            provider: ProviderId::from("gvh"),
            stop: "Bahnstrift, Hannover".to_owned(),
            exclude: vec![ExclusionRuleConfig {
                direction: Some("Alte Heide".to_owned()),
                ..ExclusionRuleConfig::default()
            }],
        },
        SourceConfig {
            id: SourceId::from("alteheide"),
            provider: ProviderId::from("gvh"),
            stop: "Alte Heide, Hannover".to_owned(),
            exclude: vec![line("^2$"), line("^135$")],
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{CanonicalDeparture, ProviderMeta, StopRef};
    use crate::plugin::ProviderPlugin;
    use crate::ports::{DeparturePort, DepartureQuery, PortError};

    struct NullPort(ProviderMeta);

    #[async_trait]
    impl DeparturePort for NullPort {
        fn provider(&self) -> &ProviderMeta {
            &self.0
        }

        async fn resolve_stop(&self, query: &str) -> Result<StopRef, PortError> {
            Err(PortError::StopNotFound(query.to_owned()))
        }

        async fn departures(
            &self,
            _stop: &StopRef,
            _query: &DepartureQuery,
        ) -> Result<Vec<CanonicalDeparture>, PortError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![ProviderPlugin::new(Arc::new(NullPort(
            ProviderMeta {
                id: ProviderId::from("gvh"),
                name: "GVH".to_owned(),
            },
        )))])
    }

    #[test]
    fn defaults_match_original_board() {
        let config = BoardConfig::default();

        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.lookahead(), TimeDelta::minutes(40));
        assert_eq!(config.sources.len(), 2);

        let sources = config.compile_sources(&registry()).unwrap();
        assert_eq!(sources[0].id, SourceId::from("bahnstrift"));
        assert!(sources.iter().all(|source| source.filter.is_some()));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = BoardConfig::default();
        config.sources[1].provider = ProviderId::from("vbb");

        assert!(matches!(
            config.compile_sources(&registry()),
            Err(ConfigError::UnknownProvider { source_id, .. }) if source_id.0 == "alteheide"
        ));
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let mut config = BoardConfig::default();
        config.sources[1].id = SourceId::from("bahnstrift");

        assert!(matches!(
            config.compile_sources(&registry()),
            Err(ConfigError::DuplicateSource(_))
        ));
    }

    #[test]
    fn empty_rule_is_rejected() {
        let mut config = BoardConfig::default();
        config.sources[0].exclude.push(ExclusionRuleConfig::default());

        assert!(matches!(
            config.compile_sources(&registry()),
            Err(ConfigError::Filter {
                error: FilterError::EmptyRule,
                ..
            })
        ));
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = BoardConfig {
            window_minutes: 0,
            ..BoardConfig::default()
        };

        assert!(matches!(
            config.compile_sources(&registry()),
            Err(ConfigError::ZeroWindow)
        ));
    }

    #[test]
    fn source_without_rules_has_no_filter() {
        let mut config = BoardConfig::default();
        config.sources[0].exclude.clear();

        let sources = config.compile_sources(&registry()).unwrap();
        assert!(sources[0].filter.is_none());
    }
}
