//! In-Memory Repository Implementations
//!
//! Thread-safe, in-memory implementations of the repository traits defined in
//! `domain::repositories`.
//!
//! # Features
//!
//! - **Thread-safe**: Uses `Arc<RwLock>` for concurrent access
//! - **Lock-light reads**: records are stored as `Arc<ActiveRecord>`; a reader
//!   clones the pointer and never waits on a write beyond the swap
//! - **Testing**: Ideal for unit tests and mock mode
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - Leases only exclude cycles inside this process

use crate::domain::market::MarketKey;
use crate::domain::optimization::{ActiveRecord, CycleLease, LeaseAcquisition, OptimizationRun};
use crate::domain::repositories::{
    ActiveRecordRepository, CycleLeaseRepository, OptimizationRunRepository, ReplaceOutcome,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct InMemoryActiveRecordRepository {
    records: Arc<RwLock<HashMap<MarketKey, Arc<ActiveRecord>>>>,
}

impl InMemoryActiveRecordRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryActiveRecordRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActiveRecordRepository for InMemoryActiveRecordRepository {
    async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn replace(&self, record: &ActiveRecord) -> Result<ReplaceOutcome> {
        let mut records = self.records.write().await;
        if let Some(current) = records.get(&record.key)
            && current.version() > record.version()
        {
            return Ok(ReplaceOutcome::Stale {
                current: current.version(),
            });
        }
        records.insert(record.key.clone(), Arc::new(record.clone()));
        Ok(ReplaceOutcome::Written)
    }

    async fn list_active(&self) -> Result<Vec<Arc<ActiveRecord>>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

/// Process-local leases keyed by market key.
pub struct InMemoryCycleLeaseRepository {
    leases: Mutex<HashMap<MarketKey, CycleLease>>,
}

impl InMemoryCycleLeaseRepository {
    pub fn new() -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCycleLeaseRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CycleLeaseRepository for InMemoryCycleLeaseRepository {
    async fn try_acquire(
        &self,
        key: &MarketKey,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<LeaseAcquisition> {
        let mut leases = self.leases.lock().await;
        if let Some(existing) = leases.get(key)
            && existing.holder != holder
            && !existing.is_expired(now)
        {
            return Ok(LeaseAcquisition::Held {
                holder: existing.holder.clone(),
                expires_at: existing.expires_at,
            });
        }

        let lease = CycleLease::new(key.clone(), holder, now, ttl);
        leases.insert(key.clone(), lease.clone());
        Ok(LeaseAcquisition::Acquired(lease))
    }

    async fn release(&self, key: &MarketKey, holder: &str) -> Result<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(key).is_some_and(|l| l.holder == holder) {
            leases.remove(key);
        }
        Ok(())
    }
}

pub struct InMemoryOptimizationRunRepository {
    runs: Arc<RwLock<Vec<OptimizationRun>>>,
}

impl InMemoryOptimizationRunRepository {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.runs.read().await.len()
    }
}

impl Default for InMemoryOptimizationRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OptimizationRunRepository for InMemoryOptimizationRunRepository {
    async fn save(&self, run: &OptimizationRun) -> Result<()> {
        let mut runs = self.runs.write().await;
        let mut run = run.clone();
        run.id = Some(runs.len() as i64 + 1);
        runs.push(run);
        Ok(())
    }

    async fn find_by_key(&self, key: &MarketKey, limit: usize) -> Result<Vec<OptimizationRun>> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .rev()
            .filter(|r| &r.key == key)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_settled(&self, key: &MarketKey) -> Result<Option<OptimizationRun>> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .rev()
            .find(|r| &r.key == key && r.settled)
            .cloned())
    }
}
