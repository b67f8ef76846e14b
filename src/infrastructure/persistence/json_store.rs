//! File-backed active records and run history.
//!
//! One JSON document per key at `<dir>/active_params_<SYMBOL>_<TF>.json`,
//! the file the live trader hot-reloads. Writes go to a temp file that is
//! renamed over the target, so a reader sees either the old or the new
//! document and never a partial one.
//!
//! Runs are appended one JSON object per line to
//! `<dir>/optimization_runs_<SYMBOL>_<TF>.jsonl`.

use crate::domain::market::MarketKey;
use crate::domain::optimization::{ActiveRecord, OptimizationRun};
use crate::domain::repositories::{
    ActiveRecordRepository, OptimizationRunRepository, ReplaceOutcome,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

const FILE_PREFIX: &str = "active_params_";
const RUNS_PREFIX: &str = "optimization_runs_";

pub struct JsonFileActiveRecordRepository {
    dir: PathBuf,
    // Serializes the read-compare-rename sequence inside this process.
    write_lock: Mutex<()>,
}

impl JsonFileActiveRecordRepository {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create results directory {:?}", dir))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path_for(&self, key: &MarketKey) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", FILE_PREFIX, key.storage_key()))
    }

    async fn load(path: &Path) -> Result<Option<ActiveRecord>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read active record {:?}", path));
            }
        };
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse active record {:?}", path))?;
        Ok(Some(record))
    }
}

#[async_trait]
impl ActiveRecordRepository for JsonFileActiveRecordRepository {
    async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>> {
        Ok(Self::load(&self.path_for(key)).await?.map(Arc::new))
    }

    async fn replace(&self, record: &ActiveRecord) -> Result<ReplaceOutcome> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(&record.key);

        if let Some(current) = Self::load(&path).await?
            && current.version() > record.version()
        {
            return Ok(ReplaceOutcome::Stale {
                current: current.version(),
            });
        }

        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize active record")?;

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .await
            .context("Failed to write temp file")?;
        fs::rename(&temp_path, &path)
            .await
            .context("Failed to rename temp file")?;

        info!("Saved active record v{} to {:?}", record.version(), path);
        Ok(ReplaceOutcome::Written)
    }

    async fn list_active(&self) -> Result<Vec<Arc<ActiveRecord>>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {:?}", self.dir))?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if !is_record {
                continue;
            }
            match Self::load(&path).await {
                Ok(Some(record)) => records.push(Arc::new(record)),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable active record {:?}: {:#}", path, e),
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

pub struct JsonFileOptimizationRunRepository {
    dir: PathBuf,
    append_lock: Mutex<()>,
}

impl JsonFileOptimizationRunRepository {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create results directory {:?}", dir))?;
        Ok(Self {
            dir,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path_for(&self, key: &MarketKey) -> PathBuf {
        self.dir
            .join(format!("{}{}.jsonl", RUNS_PREFIX, key.storage_key()))
    }

    /// Oldest first; ids are 1-based line numbers.
    async fn load_all(path: &Path) -> Result<Vec<OptimizationRun>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read run history {:?}", path));
            }
        };

        let mut runs = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OptimizationRun>(line) {
                Ok(mut run) => {
                    run.id = Some(index as i64 + 1);
                    runs.push(run);
                }
                // A torn final line from a crash must not hide the rest of the history
                Err(e) => warn!("Skipping unreadable run at {:?}:{}: {}", path, index + 1, e),
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl OptimizationRunRepository for JsonFileOptimizationRunRepository {
    async fn save(&self, run: &OptimizationRun) -> Result<()> {
        let mut stored = run.clone();
        stored.id = None;
        let mut line = serde_json::to_string(&stored).context("Failed to serialize run")?;
        line.push('\n');

        let _guard = self.append_lock.lock().await;
        let path = self.path_for(&run.key);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open run history {:?}", path))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to run history {:?}", path))?;
        file.flush().await?;
        Ok(())
    }

    async fn find_by_key(&self, key: &MarketKey, limit: usize) -> Result<Vec<OptimizationRun>> {
        let runs = Self::load_all(&self.path_for(key)).await?;
        Ok(runs.into_iter().rev().take(limit).collect())
    }

    async fn latest_settled(&self, key: &MarketKey) -> Result<Option<OptimizationRun>> {
        let runs = Self::load_all(&self.path_for(key)).await?;
        Ok(runs.into_iter().rev().find(|r| r.settled))
    }
}
