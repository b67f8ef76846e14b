use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{StorageBackend, StorageEnvConfig};
use crate::domain::repositories::{
    ActiveRecordRepository, CycleLeaseRepository, OptimizationRunRepository,
};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::json_store::{
    JsonFileActiveRecordRepository, JsonFileOptimizationRunRepository,
};
use crate::infrastructure::persistence::repositories::{
    SqliteActiveRecordRepository, SqliteCycleLeaseRepository, SqliteOptimizationRunRepository,
};
use crate::infrastructure::repositories::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
    InMemoryOptimizationRunRepository,
};

pub struct PersistenceHandle {
    pub db: Option<Database>,
    pub active_records: Arc<dyn ActiveRecordRepository>,
    pub leases: Arc<dyn CycleLeaseRepository>,
    pub runs: Arc<dyn OptimizationRunRepository>,
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(config: &StorageEnvConfig) -> Result<PersistenceHandle> {
        match config.backend {
            StorageBackend::Sqlite => {
                info!("Initializing Database at {}", config.database_url);
                let db = Database::new(&config.database_url)
                    .await
                    .context("Failed to initialize database")?;
                Ok(Self::sqlite(db))
            }
            StorageBackend::Json => {
                info!("Storing active records as JSON under {:?}", config.results_dir);
                let store = JsonFileActiveRecordRepository::new(&config.results_dir)
                    .await
                    .context("Failed to initialize JSON record store")?;
                let runs = JsonFileOptimizationRunRepository::new(&config.results_dir)
                    .await
                    .context("Failed to initialize JSON run history")?;
                Ok(PersistenceHandle {
                    db: None,
                    active_records: Arc::new(store),
                    leases: Arc::new(InMemoryCycleLeaseRepository::new()),
                    runs: Arc::new(runs),
                })
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage; records are lost on exit");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn sqlite(db: Database) -> PersistenceHandle {
        PersistenceHandle {
            active_records: Arc::new(SqliteActiveRecordRepository::new(db.pool.clone())),
            leases: Arc::new(SqliteCycleLeaseRepository::new(db.pool.clone())),
            runs: Arc::new(SqliteOptimizationRunRepository::new(db.pool.clone())),
            db: Some(db),
        }
    }

    pub fn in_memory() -> PersistenceHandle {
        PersistenceHandle {
            db: None,
            active_records: Arc::new(InMemoryActiveRecordRepository::new()),
            leases: Arc::new(InMemoryCycleLeaseRepository::new()),
            runs: Arc::new(InMemoryOptimizationRunRepository::new()),
        }
    }
}
