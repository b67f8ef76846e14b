pub mod active_record_repository;
pub mod cycle_lease_repository;
pub mod optimization_run_repository;

pub use active_record_repository::SqliteActiveRecordRepository;
pub use cycle_lease_repository::SqliteCycleLeaseRepository;
pub use optimization_run_repository::SqliteOptimizationRunRepository;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("Invalid timestamp in database: {}", ms))
}
