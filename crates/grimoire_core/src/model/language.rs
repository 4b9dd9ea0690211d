//! Language code value type.
//!
//! # Responsibility
//! - Validate the 2-letter lowercase key used for translation variants.
//! - Provide a total order so language lists are deterministic.
//!
//! # Invariants
//! - A constructed `LanguageCode` always matches `^[a-z]{2}$`.
//! - No case folding: `"FR"` is rejected, not normalized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static LANGUAGE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}$").expect("valid language code regex"));

/// Two-letter lowercase ISO 639-1 style language code (`en`, `fr`, `es`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

/// Raised when a string is not a valid language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLanguageCode {
    /// Raw rejected input.
    pub value: String,
}

impl Display for InvalidLanguageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid language code `{}`: expected a 2-letter lowercase code (e.g. fr, en, es)",
            self.value
        )
    }
}

impl Error for InvalidLanguageCode {}

impl LanguageCode {
    /// Parses and validates a language code.
    pub fn parse(value: &str) -> Result<Self, InvalidLanguageCode> {
        if LANGUAGE_CODE_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidLanguageCode {
                value: value.to_string(),
            })
        }
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = InvalidLanguageCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if LANGUAGE_CODE_RE.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidLanguageCode { value })
        }
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

impl Display for LanguageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::LanguageCode;

    #[test]
    fn parse_accepts_two_lowercase_letters() {
        assert_eq!(LanguageCode::parse("fr").unwrap().as_str(), "fr");
    }

    #[test]
    fn parse_rejects_uppercase_long_and_empty_codes() {
        for raw in ["FR", "Fr", "fra", "f", "", "f1", " fr", "é"] {
            let err = LanguageCode::parse(raw).unwrap_err();
            assert_eq!(err.value, raw);
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut codes = vec![
            LanguageCode::parse("fr").unwrap(),
            LanguageCode::parse("de").unwrap(),
            LanguageCode::parse("en").unwrap(),
        ];
        codes.sort();
        let ordered: Vec<&str> = codes.iter().map(LanguageCode::as_str).collect();
        assert_eq!(ordered, vec!["de", "en", "fr"]);
    }
}
