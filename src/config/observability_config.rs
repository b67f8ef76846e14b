//! Metrics push and log output settings.

use super::env::{Lookup, parse_or};
use anyhow::Result;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid LOG_FORMAT: {}. Must be 'pretty' or 'json'", s),
        }
    }
}

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub log_format: LogFormat,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let interval_secs = parse_or(lookup, "OBSERVABILITY_INTERVAL", 60u64)?;
        if interval_secs == 0 {
            anyhow::bail!("OBSERVABILITY_INTERVAL must be greater than 0");
        }
        Ok(Self {
            enabled: parse_or(lookup, "OBSERVABILITY_ENABLED", false)?,
            interval_secs,
            log_format: parse_or(lookup, "LOG_FORMAT", LogFormat::Pretty)?,
        })
    }
}
