use crate::domain::market::MarketKey;
use crate::domain::ports::{CandleFreshnessSource, FreshnessSnapshot};
use crate::domain::repositories::{ActiveRecordRepository, OptimizationRunRepository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads freshness back from storage: the active record's `data_end` and
/// evaluation time, or those of the latest settled optimization run when
/// that run saw newer data. Runs that promoted nothing still count, so a
/// declined candidate does not send the optimizer back over the same data.
pub struct ActiveSnapshotFreshness {
    records: Arc<dyn ActiveRecordRepository>,
    runs: Option<Arc<dyn OptimizationRunRepository>>,
}

impl ActiveSnapshotFreshness {
    pub fn new(records: Arc<dyn ActiveRecordRepository>) -> Self {
        Self {
            records,
            runs: None,
        }
    }

    pub fn with_runs(mut self, runs: Arc<dyn OptimizationRunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }
}

#[async_trait]
impl CandleFreshnessSource for ActiveSnapshotFreshness {
    async fn freshness(&self, key: &MarketKey) -> Result<Option<FreshnessSnapshot>> {
        let record = self
            .records
            .get_active(key)
            .await
            .with_context(|| format!("Failed to read active record for {}", key))?;
        let from_record = record.map(|r| FreshnessSnapshot {
            last_data_at: r.data_end,
            last_evaluated_at: r.last_evaluated_at,
        });

        let from_run = match &self.runs {
            Some(runs) => runs
                .latest_settled(key)
                .await
                .with_context(|| format!("Failed to read run history for {}", key))?
                .map(|run| FreshnessSnapshot {
                    last_data_at: run.data_end,
                    last_evaluated_at: run.ran_at,
                }),
            None => None,
        };

        Ok(match (from_record, from_run) {
            (Some(record), Some(run)) => Some(newer(record, run)),
            (record, run) => record.or(run),
        })
    }
}

fn newer(a: FreshnessSnapshot, b: FreshnessSnapshot) -> FreshnessSnapshot {
    FreshnessSnapshot {
        last_data_at: a.last_data_at.max(b.last_data_at),
        last_evaluated_at: a.last_evaluated_at.max(b.last_evaluated_at),
    }
}
