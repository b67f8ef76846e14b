use crate::domain::market::MarketKey;
use crate::domain::optimization::ActiveRecord;
use crate::domain::repositories::{ActiveRecordRepository, ReplaceOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteActiveRecordRepository {
    pool: SqlitePool,
}

impl SqliteActiveRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Arc<ActiveRecord>> {
        let json: String = row.try_get("record_json")?;
        let record: ActiveRecord =
            serde_json::from_str(&json).context("Failed to parse stored active record")?;
        Ok(Arc::new(record))
    }
}

#[async_trait]
impl ActiveRecordRepository for SqliteActiveRecordRepository {
    async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>> {
        let row = sqlx::query(
            "SELECT record_json FROM active_records WHERE symbol = ? AND timeframe = ?",
        )
        .bind(&key.symbol)
        .bind(key.timeframe.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load active record")?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn replace(&self, record: &ActiveRecord) -> Result<ReplaceOutcome> {
        let json = serde_json::to_string(record).context("Failed to serialize active record")?;
        let version = i64::try_from(record.version()).context("Version out of range")?;

        let mut tx = self.pool.begin().await?;

        // Single-statement upsert; the row is swapped whole or not at all.
        let result = sqlx::query(
            r#"
            INSERT INTO active_records
            (symbol, timeframe, version, record_json, data_end, last_evaluated_at, written_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timeframe) DO UPDATE SET
                version = excluded.version,
                record_json = excluded.record_json,
                data_end = excluded.data_end,
                last_evaluated_at = excluded.last_evaluated_at,
                written_at = excluded.written_at
            WHERE excluded.version >= active_records.version
            "#,
        )
        .bind(&record.key.symbol)
        .bind(record.key.timeframe.as_str())
        .bind(version)
        .bind(&json)
        .bind(record.data_end.timestamp_millis())
        .bind(record.last_evaluated_at.timestamp_millis())
        .bind(record.written_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .context("Failed to write active record")?;

        if result.rows_affected() == 0 {
            let row = sqlx::query(
                "SELECT version FROM active_records WHERE symbol = ? AND timeframe = ?",
            )
            .bind(&record.key.symbol)
            .bind(record.key.timeframe.as_str())
            .fetch_one(&mut *tx)
            .await?;
            let current: i64 = row.try_get("version")?;
            tx.rollback().await?;
            return Ok(ReplaceOutcome::Stale {
                current: current.max(0) as u64,
            });
        }

        tx.commit().await.context("Failed to commit active record")?;
        debug!("Persisted active record {} v{}", record.key, record.version());
        Ok(ReplaceOutcome::Written)
    }

    async fn list_active(&self) -> Result<Vec<Arc<ActiveRecord>>> {
        let rows = sqlx::query("SELECT record_json FROM active_records ORDER BY symbol, timeframe")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::decode).collect()
    }
}
