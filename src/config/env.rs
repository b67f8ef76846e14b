//! Typed lookups over an environment-like key/value source.

use anyhow::{Context, Result};
use std::str::FromStr;

/// Variable source. `std::env` in production, a map in tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Parses `name` if set and non-blank, otherwise returns `default`.
/// A value that is set but unparsable is an error.
pub fn parse_or<T>(lookup: Lookup<'_>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {}: {}", name, raw)),
        None => Ok(default),
    }
}

pub fn optional(lookup: Lookup<'_>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn string_or(lookup: Lookup<'_>, name: &str, default: &str) -> String {
    optional(lookup, name).unwrap_or_else(|| default.to_string())
}

/// Comma separated list; blank entries are dropped.
pub fn list_or<T>(lookup: Lookup<'_>, name: &str, default: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = string_or(lookup, name, default);
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid entry in {}: {}", name, s))
        })
        .collect()
}
