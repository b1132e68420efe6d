//! Language Resolution
//!
//! Maps language codes and English names onto (code, display name) pairs so
//! configuration can say either `"es"` or `"spanish"`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Languages the prompt templates and speech routing understand.
const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("pt", "Portuguese"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("ru", "Russian"),
    ("tr", "Turkish"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("hi", "Hindi"),
    ("ar", "Arabic"),
];

/// A resolved language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// ISO 639-1 code (e.g. "es")
    pub code: String,
    /// English display name (e.g. "Spanish")
    pub name: String,
}

impl Language {
    /// Resolves a code or English name, case-insensitively.
    pub fn parse(input: &str) -> Result<Self> {
        let needle = input.trim();
        LANGUAGES
            .iter()
            .find(|(code, name)| {
                code.eq_ignore_ascii_case(needle) || name.eq_ignore_ascii_case(needle)
            })
            .map(|(code, name)| Self {
                code: code.to_string(),
                name: name.to_string(),
            })
            .ok_or_else(|| Error::Validation(format!("unknown language '{}'", input)))
    }
}

/// Resolves a list of codes/names, preserving order.
pub fn resolve_all(inputs: &[String]) -> Result<Vec<Language>> {
    inputs.iter().map(|input| Language::parse(input)).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_and_name() {
        let by_code = Language::parse("es").unwrap();
        assert_eq!(by_code.name, "Spanish");

        let by_name = Language::parse("Spanish").unwrap();
        assert_eq!(by_name.code, "es");

        let case_insensitive = Language::parse("ENGLISH").unwrap();
        assert_eq!(case_insensitive.code, "en");
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            Language::parse("klingon"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_all_preserves_order() {
        let resolved =
            resolve_all(&["english".to_string(), "es".to_string()]).unwrap();
        let codes: Vec<&str> = resolved.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["en", "es"]);
    }
}
