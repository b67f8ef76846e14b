//! Repository Pattern Abstractions
//!
//! Storage seams of the reoptimization loop:
//! - `ActiveRecordRepository`: the production binding per market key
//! - `CycleLeaseRepository`: per-key mutual exclusion with expiry
//! - `OptimizationRunRepository`: append-only history of optimizer runs
//!
//! SQLite, JSON-file and in-memory implementations live in `infrastructure`.

use crate::domain::market::MarketKey;
use crate::domain::optimization::{ActiveRecord, LeaseAcquisition, OptimizationRun};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Written,
    /// Stored record carries a higher version; nothing was written.
    Stale { current: u64 },
}

/// Reads never observe a half-written record: implementations replace the
/// whole record atomically.
#[async_trait]
pub trait ActiveRecordRepository: Send + Sync {
    async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>>;

    /// Replaces the record for `record.key` unless the stored version is
    /// higher. Writing the same version again is allowed.
    async fn replace(&self, record: &ActiveRecord) -> Result<ReplaceOutcome>;

    async fn list_active(&self) -> Result<Vec<Arc<ActiveRecord>>>;
}

#[async_trait]
pub trait CycleLeaseRepository: Send + Sync {
    /// Takes the lease if it is free, expired, or already held by `holder`.
    async fn try_acquire(
        &self,
        key: &MarketKey,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<LeaseAcquisition>;

    /// Drops the lease only if `holder` still owns it.
    async fn release(&self, key: &MarketKey, holder: &str) -> Result<()>;
}

#[async_trait]
pub trait OptimizationRunRepository: Send + Sync {
    async fn save(&self, run: &OptimizationRun) -> Result<()>;

    /// Most recent first.
    async fn find_by_key(&self, key: &MarketKey, limit: usize) -> Result<Vec<OptimizationRun>>;

    /// Most recent run whose verdict stands; drives the staleness check
    /// after cycles that evaluated data but promoted nothing.
    async fn latest_settled(&self, key: &MarketKey) -> Result<Option<OptimizationRun>>;
}
