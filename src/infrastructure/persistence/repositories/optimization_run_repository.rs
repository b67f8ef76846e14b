use super::from_millis;
use crate::domain::market::MarketKey;
use crate::domain::optimization::{Candidate, OptimizationRun};
use crate::domain::repositories::OptimizationRunRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub struct SqliteOptimizationRunRepository {
    pool: SqlitePool,
}

impl SqliteOptimizationRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn run_from_row(key: &MarketKey, row: &SqliteRow) -> Result<OptimizationRun> {
        let best_json: String = row.try_get("best_json")?;
        let best: Candidate =
            serde_json::from_str(&best_json).context("Failed to parse stored candidate")?;
        let promoted: Option<i64> = row.try_get("promoted_version")?;
        let evaluated: i64 = row.try_get("evaluated")?;
        let settled: i64 = row.try_get("settled")?;

        Ok(OptimizationRun {
            id: Some(row.try_get("id")?),
            key: key.clone(),
            ran_at: from_millis(row.try_get("ran_at")?)?,
            data_end: from_millis(row.try_get("data_end")?)?,
            evaluated: evaluated.max(0) as usize,
            best,
            promoted_version: promoted.map(|v| v.max(0) as u64),
            settled: settled != 0,
        })
    }
}

#[async_trait]
impl OptimizationRunRepository for SqliteOptimizationRunRepository {
    async fn save(&self, run: &OptimizationRun) -> Result<()> {
        let best_json =
            serde_json::to_string(&run.best).context("Failed to serialize best candidate")?;

        sqlx::query(
            r#"
            INSERT INTO optimization_runs
            (symbol, timeframe, ran_at, data_end, evaluated, best_json, return_pct, sharpe, max_drawdown_pct, promoted_version, settled)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.key.symbol)
        .bind(run.key.timeframe.as_str())
        .bind(run.ran_at.timestamp_millis())
        .bind(run.data_end.timestamp_millis())
        .bind(run.evaluated as i64)
        .bind(&best_json)
        .bind(run.best.metrics.return_pct)
        .bind(run.best.metrics.sharpe)
        .bind(run.best.metrics.max_drawdown_pct)
        .bind(run.promoted_version.map(|v| v as i64))
        .bind(run.settled as i64)
        .execute(&self.pool)
        .await
        .context("Failed to save optimization run")?;

        Ok(())
    }

    async fn find_by_key(&self, key: &MarketKey, limit: usize) -> Result<Vec<OptimizationRun>> {
        let rows = sqlx::query(
            "SELECT * FROM optimization_runs WHERE symbol = ? AND timeframe = ? ORDER BY ran_at DESC, id DESC LIMIT ?",
        )
        .bind(&key.symbol)
        .bind(key.timeframe.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| Self::run_from_row(key, row)).collect()
    }

    async fn latest_settled(&self, key: &MarketKey) -> Result<Option<OptimizationRun>> {
        let row = sqlx::query(
            "SELECT * FROM optimization_runs WHERE symbol = ? AND timeframe = ? AND settled = 1 ORDER BY ran_at DESC, id DESC LIMIT 1",
        )
        .bind(&key.symbol)
        .bind(key.timeframe.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read latest optimization run")?;

        row.map(|row| Self::run_from_row(key, &row)).transpose()
    }
}
