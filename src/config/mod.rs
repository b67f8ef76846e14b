//! Configuration module for the reoptimizer.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Reoptimizer loop, Gates, Storage, and Observability.
//! A value that is set but malformed fails startup instead of falling back.

mod env;
mod gate_config;
mod observability_config;
mod reoptimizer_config;
mod storage_config;

pub use env::Lookup;
pub use gate_config::GateEnvConfig;
pub use observability_config::{LogFormat, ObservabilityEnvConfig};
pub use reoptimizer_config::{ReoptimizerEnvConfig, load_grid_from_toml};
pub use storage_config::{StorageBackend, StorageEnvConfig};

use crate::domain::market::{MarketKey, Timeframe};
use anyhow::Result;
use std::str::FromStr;

/// Candle source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mock,
    Binance,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "binance" => Ok(Mode::Binance),
            _ => anyhow::bail!("Invalid MODE: {}. Must be 'mock' or 'binance'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub binance_base_url: String,
    pub reoptimizer: ReoptimizerEnvConfig,
    pub gate: GateEnvConfig,
    pub storage: StorageEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let symbols: Vec<String> = env::list_or(lookup, "REOPT_SYMBOLS", "BTCUSDC")?;
        let timeframes: Vec<Timeframe> = env::list_or(lookup, "REOPT_TIMEFRAMES", "15m")?;
        if symbols.is_empty() {
            anyhow::bail!("REOPT_SYMBOLS must name at least one symbol");
        }
        if timeframes.is_empty() {
            anyhow::bail!("REOPT_TIMEFRAMES must name at least one timeframe");
        }

        Ok(Self {
            mode: env::parse_or(lookup, "MODE", Mode::Mock)?,
            symbols,
            timeframes,
            binance_base_url: env::string_or(lookup, "BINANCE_BASE_URL", "https://api.binance.com"),
            reoptimizer: ReoptimizerEnvConfig::from_lookup(lookup)?,
            gate: GateEnvConfig::from_lookup(lookup)?,
            storage: StorageEnvConfig::from_lookup(lookup)?,
            observability: ObservabilityEnvConfig::from_lookup(lookup)?,
        })
    }

    /// Every configured (symbol, timeframe) pair, deduplicated, in config order.
    pub fn market_keys(&self) -> Vec<MarketKey> {
        let mut keys: Vec<MarketKey> = Vec::new();
        for symbol in &self.symbols {
            for timeframe in &self.timeframes {
                let key = MarketKey::new(symbol.as_str(), *timeframe);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}
