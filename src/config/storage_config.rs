use super::env::{Lookup, optional, parse_or, string_or};
use anyhow::Result;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Json,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "json" => Ok(StorageBackend::Json),
            "memory" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!(
                "Invalid STORAGE_BACKEND: {}. Must be 'sqlite', 'json' or 'memory'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub results_dir: PathBuf,
    pub candidates_csv_dir: Option<PathBuf>,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_url: "sqlite://data/reoptimizer.db".to_string(),
            results_dir: PathBuf::from("results"),
            candidates_csv_dir: None,
        }
    }
}

impl StorageEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            backend: parse_or(lookup, "STORAGE_BACKEND", StorageBackend::Sqlite)?,
            database_url: string_or(lookup, "DATABASE_URL", "sqlite://data/reoptimizer.db"),
            results_dir: PathBuf::from(string_or(lookup, "RESULTS_DIR", "results")),
            candidates_csv_dir: optional(lookup, "REOPT_CANDIDATES_CSV_DIR").map(PathBuf::from),
        })
    }
}
