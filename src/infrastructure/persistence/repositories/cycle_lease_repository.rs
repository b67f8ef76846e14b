use super::from_millis;
use crate::domain::market::MarketKey;
use crate::domain::optimization::{CycleLease, LeaseAcquisition};
use crate::domain::repositories::CycleLeaseRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

/// Cross-process lease table. A lease row is taken over only once it has
/// expired, so a crashed holder blocks its key for at most one TTL.
pub struct SqliteCycleLeaseRepository {
    pool: SqlitePool,
}

impl SqliteCycleLeaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CycleLeaseRepository for SqliteCycleLeaseRepository {
    async fn try_acquire(
        &self,
        key: &MarketKey,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<LeaseAcquisition> {
        let lease = CycleLease::new(key.clone(), holder, now, ttl);

        let result = sqlx::query(
            r#"
            INSERT INTO cycle_leases (symbol, timeframe, holder, acquired_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timeframe) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE cycle_leases.expires_at <= ? OR cycle_leases.holder = excluded.holder
            "#,
        )
        .bind(&key.symbol)
        .bind(key.timeframe.as_str())
        .bind(holder)
        .bind(lease.acquired_at.timestamp_millis())
        .bind(lease.expires_at.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to acquire cycle lease")?;

        if result.rows_affected() > 0 {
            return Ok(LeaseAcquisition::Acquired(lease));
        }

        let row = sqlx::query(
            "SELECT holder, expires_at FROM cycle_leases WHERE symbol = ? AND timeframe = ?",
        )
        .bind(&key.symbol)
        .bind(key.timeframe.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to read current lease holder")?;

        Ok(LeaseAcquisition::Held {
            holder: row.try_get("holder")?,
            expires_at: from_millis(row.try_get("expires_at")?)?,
        })
    }

    async fn release(&self, key: &MarketKey, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM cycle_leases WHERE symbol = ? AND timeframe = ? AND holder = ?")
            .bind(&key.symbol)
            .bind(key.timeframe.as_str())
            .bind(holder)
            .execute(&self.pool)
            .await
            .context("Failed to release cycle lease")?;
        Ok(())
    }
}
