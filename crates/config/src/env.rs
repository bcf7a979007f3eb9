//! Environment source abstraction
//!
//! Wraps either the process environment or an in-memory map so configuration
//! parsing is testable without mutating global state.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// A source of configuration variables
#[derive(Debug, Clone)]
pub enum Env {
    /// Read from `std::env`
    Process,
    /// Read from a fixed map (tests)
    Map(HashMap<String, String>),
}

impl Env {
    /// The real process environment
    pub fn process() -> Self {
        Self::Process
    }

    /// A fixed in-memory environment
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Raw lookup. Empty values are treated as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            Self::Process => std::env::var(key).ok(),
            Self::Map(map) => map.get(key).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// String value with a default
    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parsed value with a default
    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Boolean flag: "1"/"true"/"yes" are true, "0"/"false"/"no" are false
    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                other => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    message: format!("expected boolean, got {other:?}"),
                }),
            },
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_is_unset() {
        let env = Env::from_pairs([("SB_X", "  ")]);
        assert_eq!(env.get("SB_X"), None);
        assert_eq!(env.string("SB_X", "fallback"), "fallback");
    }

    #[test]
    fn test_flag_variants() {
        let env = Env::from_pairs([("A", "1"), ("B", "false"), ("C", "Yes")]);
        assert!(env.flag("A", false).unwrap());
        assert!(!env.flag("B", true).unwrap());
        assert!(env.flag("C", false).unwrap());
        assert!(env.flag("MISSING", true).unwrap());
        assert!(env.flag("MISSING", false).is_ok());
    }

    #[test]
    fn test_flag_rejects_garbage() {
        let env = Env::from_pairs([("A", "maybe")]);
        assert!(env.flag("A", false).is_err());
    }

    #[test]
    fn test_parse_default_and_override() {
        let env = Env::from_pairs([("N", "42")]);
        assert_eq!(env.parse::<u32>("N", 7).unwrap(), 42);
        assert_eq!(env.parse::<u32>("MISSING", 7).unwrap(), 7);
    }
}
