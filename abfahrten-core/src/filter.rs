//! Per-source predicates that keep redundant departures off the board.

use regex::Regex;

use crate::model::CanonicalDeparture;

/// Decides whether a departure reported by one source belongs on the board.
pub trait DepartureFilter: Send + Sync {
    /// `true` to keep the departure.
    fn include_in_board(&self, departure: &CanonicalDeparture) -> bool;
}

impl<F> DepartureFilter for F
where
    F: Fn(&CanonicalDeparture) -> bool + Send + Sync,
{
    fn include_in_board(&self, departure: &CanonicalDeparture) -> bool {
        self(departure)
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors while building an [`ExclusionRule`].
pub enum FilterError {
    /// A pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compiler error.
        source: regex::Error,
    },
    /// The rule would match every departure.
    #[error("exclusion rule defines no pattern")]
    EmptyRule,
}

/// Excludes departures whose fields all match the given patterns.
///
/// Patterns are unanchored regular expressions tested against the
/// normalized line, direction and stop labels.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    line: Option<Regex>,
    direction: Option<Regex>,
    stop: Option<Regex>,
}

impl ExclusionRule {
    /// Compile a rule from optional patterns.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::EmptyRule`] if no pattern is given and
    /// [`FilterError::InvalidPattern`] if one does not compile.
    pub fn new(
        line: Option<&str>,
        direction: Option<&str>,
        stop: Option<&str>,
    ) -> Result<Self, FilterError> {
        if line.is_none() && direction.is_none() && stop.is_none() {
            return Err(FilterError::EmptyRule);
        }
        Ok(Self {
            line: line.map(compile).transpose()?,
            direction: direction.map(compile).transpose()?,
            stop: stop.map(compile).transpose()?,
        })
    }

    /// Whether every pattern of this rule matches the departure.
    #[must_use]
    pub fn matches(&self, departure: &CanonicalDeparture) -> bool {
        [
            (&self.line, departure.line.as_str()),
            (&self.direction, departure.direction.as_str()),
            (&self.stop, departure.stop_name.as_str()),
        ]
        .into_iter()
        .all(|(pattern, field)| pattern.as_ref().is_none_or(|regex| regex.is_match(field)))
    }
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_owned(),
        source,
    })
}

/// Exclusion rules attached to one source.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    rules: Vec<ExclusionRule>,
}

impl SourceFilter {
    /// Filter excluding everything any of `rules` matches.
    #[must_use]
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// Whether the filter has no rules and keeps everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl DepartureFilter for SourceFilter {
    fn include_in_board(&self, departure: &CanonicalDeparture) -> bool {
        !self.rules.iter().any(|rule| rule.matches(departure))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    use super::*;

    fn departure(line: &str, direction: &str) -> CanonicalDeparture {
        CanonicalDeparture {
            stop_name: "Alte Heide".to_owned(),
            platform: None,
            line: line.to_owned(),
            line_number: line.parse().unwrap(),
            direction: direction.to_owned(),
            scheduled_time: Berlin.with_ymd_and_hms(2024, 5, 6, 14, 32, 0).unwrap(),
            realtime_time: None,
            cancelled: false,
        }
    }

    #[test]
    fn rule_requires_every_pattern() {
        let rule = ExclusionRule::new(Some("^3$"), Some("Alte Heide"), None).unwrap();

        assert!(rule.matches(&departure("3", "Alte Heide")));
        assert!(!rule.matches(&departure("3", "Wettbergen")));
        assert!(!rule.matches(&departure("13", "Alte Heide")));
    }

    #[test]
    fn filter_rejects_any_matching_rule() {
        let filter = SourceFilter::new(vec![
            ExclusionRule::new(Some("^2$"), None, None).unwrap(),
            ExclusionRule::new(Some("^135$"), None, None).unwrap(),
        ]);

        assert!(!filter.include_in_board(&departure("2", "Rethen")));
        assert!(!filter.include_in_board(&departure("135", "Lahe")));
        assert!(filter.include_in_board(&departure("3", "Wettbergen")));
        assert!(filter.include_in_board(&departure("12", "Rethen")));
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = SourceFilter::default();

        assert!(filter.is_empty());
        assert!(filter.include_in_board(&departure("3", "Alte Heide")));
    }

    #[test]
    fn empty_rule_is_rejected() {
        assert!(matches!(
            ExclusionRule::new(None, None, None),
            Err(FilterError::EmptyRule)
        ));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(matches!(
            ExclusionRule::new(Some("(unclosed"), None, None),
            Err(FilterError::InvalidPattern { pattern, .. }) if pattern == "(unclosed"
        ));
    }

    #[test]
    fn closures_act_as_filters() {
        let no_trams_to_alte_heide =
            |departure: &CanonicalDeparture| !departure.direction.contains("Alte Heide");

        assert!(!no_trams_to_alte_heide.include_in_board(&departure("3", "Alte Heide")));
        assert!(no_trams_to_alte_heide.include_in_board(&departure("3", "Wettbergen")));
    }
}
