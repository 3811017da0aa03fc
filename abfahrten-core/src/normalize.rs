//! Label normalization shared by every feed adapter.
//!
//! All adapters go through the same [`Normalizer`] so that stop names,
//! directions and line labels from different feeds compare equal.

use regex::Regex;

use crate::ports::MalformedRecord;

/// Home city of the original deployment.
pub const DEFAULT_CITY: &str = "Hannover";
/// Vehicle-type tags prefixed to line labels (tram and bus).
pub const DEFAULT_LINE_PREFIXES: [&str; 2] = ["STR", "Bus"];

/// Strips city decorations from place names and vehicle tags from line labels.
#[derive(Debug, Clone)]
pub struct Normalizer {
    city_decoration: Regex,
    line_prefix: Option<Regex>,
}

impl Normalizer {
    /// Build a normalizer for `city` and the given line prefixes.
    ///
    /// # Errors
    ///
    /// Returns a [`regex::Error`] if the generated patterns exceed the regex size limits.
    pub fn new<S: AsRef<str>>(city: &str, line_prefixes: &[S]) -> Result<Self, regex::Error> {
        let city = regex::escape(city.trim());
        let city_decoration = Regex::new(&format!(
            r"^{city}[ /]|, {city}$| \({city}\)$"
        ))?;

        let prefixes = line_prefixes
            .iter()
            .map(|prefix| prefix.as_ref().trim())
            .filter(|prefix| !prefix.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();
        let line_prefix = if prefixes.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"^(?:{}) ", prefixes.join("|")))?)
        };

        Ok(Self {
            city_decoration,
            line_prefix,
        })
    }

    /// Remove a leading `City/`, `City `, a trailing `, City` or ` (City)`.
    #[must_use]
    pub fn place(&self, raw: &str) -> String {
        self.city_decoration.replace_all(raw.trim(), "").trim().to_owned()
    }

    /// Remove the vehicle-type tag from a line label.
    #[must_use]
    pub fn line(&self, raw: &str) -> String {
        let raw = raw.trim();
        match &self.line_prefix {
            Some(prefix) => prefix.replace(raw, "").trim().to_owned(),
            None => raw.to_owned(),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CITY, &DEFAULT_LINE_PREFIXES).expect("built-in patterns are valid")
    }
}

/// Numeric line number: every digit of the raw label, in order.
///
/// # Errors
///
/// Returns [`MalformedRecord::NoLineNumber`] when the label has no digits and
/// [`MalformedRecord::LineNumberOutOfRange`] when the digits overflow.
pub fn line_number(raw_label: &str) -> Result<u32, MalformedRecord> {
    let digits = raw_label
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if digits.is_empty() {
        return Err(MalformedRecord::NoLineNumber(raw_label.to_owned()));
    }
    digits
        .parse()
        .map_err(|_err| MalformedRecord::LineNumberOutOfRange(raw_label.to_owned()))
}
