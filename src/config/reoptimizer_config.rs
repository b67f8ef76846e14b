//! Cycle cadence, window, timeouts and retry settings.

use super::env::{Lookup, optional, parse_or};
use crate::domain::optimization::{ParameterGrid, RankingMetric};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReoptimizerEnvConfig {
    pub window: usize,
    pub cadence: Duration,
    pub stale_threshold: Duration,
    pub force: bool,
    pub optimizer_timeout: Duration,
    pub lease_ttl: Duration,
    pub persist_max_attempts: u32,
    pub persist_base_delay_ms: u64,
    pub ranking: RankingMetric,
    pub grid_file: Option<PathBuf>,
}

impl Default for ReoptimizerEnvConfig {
    fn default() -> Self {
        Self {
            window: 5000,
            cadence: Duration::from_secs(720 * 60),
            stale_threshold: Duration::from_secs(2880 * 60),
            force: false,
            optimizer_timeout: Duration::from_secs(900),
            lease_ttl: Duration::from_secs(1800),
            persist_max_attempts: 3,
            persist_base_delay_ms: 500,
            ranking: RankingMetric::ReturnPct,
            grid_file: None,
        }
    }
}

impl ReoptimizerEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let config = Self {
            window: parse_or(lookup, "REOPT_WINDOW", 5000usize)?,
            cadence: minutes_or(lookup, "REOPT_CADENCE_MIN", 720)?,
            stale_threshold: minutes_or(lookup, "REOPT_STALE_MIN", 2880)?,
            force: parse_or(lookup, "REOPT_FORCE", false)?,
            optimizer_timeout: Duration::from_secs(parse_or(
                lookup,
                "REOPT_OPTIMIZER_TIMEOUT_SECS",
                900u64,
            )?),
            lease_ttl: Duration::from_secs(parse_or(lookup, "REOPT_LEASE_TTL_SECS", 1800u64)?),
            persist_max_attempts: parse_or(lookup, "REOPT_PERSIST_ATTEMPTS", 3u32)?,
            persist_base_delay_ms: parse_or(lookup, "REOPT_PERSIST_BACKOFF_MS", 500u64)?,
            ranking: parse_or(lookup, "REOPT_RANK_BY", RankingMetric::ReturnPct)?,
            grid_file: optional(lookup, "REOPT_GRID_FILE").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            anyhow::bail!("REOPT_WINDOW must be greater than 0");
        }
        if self.cadence.is_zero() {
            anyhow::bail!("REOPT_CADENCE_MIN must be greater than 0");
        }
        if self.persist_max_attempts == 0 {
            anyhow::bail!("REOPT_PERSIST_ATTEMPTS must be at least 1");
        }
        if self.lease_ttl <= self.optimizer_timeout {
            anyhow::bail!(
                "REOPT_LEASE_TTL_SECS ({}) must exceed REOPT_OPTIMIZER_TIMEOUT_SECS ({})",
                self.lease_ttl.as_secs(),
                self.optimizer_timeout.as_secs()
            );
        }
        Ok(())
    }

    /// The configured grid file, or the built-in grid.
    pub fn load_grid(&self) -> Result<ParameterGrid> {
        match &self.grid_file {
            Some(path) => load_grid_from_toml(path),
            None => Ok(ParameterGrid::default()),
        }
    }
}

fn minutes_or(lookup: Lookup<'_>, name: &str, default: u64) -> Result<Duration> {
    let minutes = parse_or(lookup, name, default)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .with_context(|| format!("Invalid {}: {} minutes is out of range", name, minutes))
}

pub fn load_grid_from_toml(path: impl AsRef<std::path::Path>) -> Result<ParameterGrid> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grid config file: {:?}", path))?;
    let grid: ParameterGrid = toml::from_str(&content)
        .with_context(|| format!("Failed to parse grid config TOML: {:?}", path))?;
    if grid.is_empty() {
        anyhow::bail!("Grid config {:?} yields no valid combination", path);
    }
    Ok(grid)
}
