use super::metrics::BacktestMetrics;
use super::parameter_set::ParameterSet;
use crate::domain::market::MarketKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The production binding for one market key.
///
/// Stores hand these out behind `Arc` and swap the whole record on write;
/// nothing edits a record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRecord {
    pub key: MarketKey,
    pub parameters: ParameterSet,
    pub metrics: BacktestMetrics,
    /// Open time of the last candle in the evaluation window.
    pub data_end: DateTime<Utc>,
    pub last_evaluated_at: DateTime<Utc>,
    /// `last_evaluated_at - data_end` in seconds.
    pub data_age_secs: i64,
    pub written_at: DateTime<Utc>,
}

impl ActiveRecord {
    pub fn new(
        parameters: ParameterSet,
        metrics: BacktestMetrics,
        data_end: DateTime<Utc>,
        last_evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: parameters.key().clone(),
            data_age_secs: (last_evaluated_at - data_end).num_seconds().max(0),
            parameters,
            metrics,
            data_end,
            last_evaluated_at,
            written_at: last_evaluated_at,
        }
    }

    pub fn version(&self) -> u64 {
        self.parameters.version()
    }
}
