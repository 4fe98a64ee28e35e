//! Environment variable parsing
//!
//! Configuration is read through [`EnvLookup`] so tests can feed a plain map
//! instead of mutating the process environment.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Error produced when an environment variable holds an unusable value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{key}: invalid value '{value}': {reason}")]
pub struct EnvError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Source of environment variables
pub trait EnvLookup {
    /// Raw value of `key`, if set
    fn get(&self, key: &str) -> Option<String>;

    /// Trimmed value of `key`, treating empty strings as unset
    fn optional(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Value of `key` or `default`
    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Boolean flag; see [`parse_bool`]
    fn flag(&self, key: &str, default: bool) -> bool {
        self.optional(key).map_or(default, |v| parse_bool(&v))
    }

    /// Comma separated list with blank entries dropped
    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.optional(key) {
            Some(raw) => split_list(&raw),
            None => default.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Parse `key` with `FromStr`, falling back to `default` when unset
    fn parse<T>(&self, key: &str, default: T) -> Result<T, EnvError>
    where
        Self: Sized,
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|e| EnvError {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl EnvLookup for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| (*v).to_string())
    }
}

/// Interpret `true`, `1`, `yes` and `on` (any case) as true
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Split a comma separated list, trimming entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
