use crate::domain::errors::ReoptimizationError;
use crate::domain::market::{Candle, MarketKey};
use crate::domain::optimization::{Candidate, ParameterGrid, RankingMetric};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Historical candles, oldest first.
#[async_trait]
pub trait MarketDataService: Send + Sync {
    async fn get_candles(&self, key: &MarketKey, limit: usize) -> Result<Vec<Candle>>;
}

/// Timestamps the staleness check runs on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreshnessSnapshot {
    pub last_data_at: DateTime<Utc>,
    pub last_evaluated_at: DateTime<Utc>,
}

/// Answers "how old is the data behind the current parameters".
/// `Ok(None)` means nothing has been evaluated for the key yet.
#[async_trait]
pub trait CandleFreshnessSource: Send + Sync {
    async fn freshness(&self, key: &MarketKey) -> Result<Option<FreshnessSnapshot>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub key: MarketKey,
    /// Number of most recent candles to evaluate on.
    pub window: usize,
    pub grid: ParameterGrid,
    pub ranking: RankingMetric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    /// Best first, per the request's ranking metric.
    pub candidates: Vec<Candidate>,
    /// Open time of the newest candle in the window.
    pub data_end: DateTime<Utc>,
    pub candles_used: usize,
}

/// Black-box parameter search. Must be deterministic for identical inputs.
#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationReport, ReoptimizationError>;
}

/// Sink for the full ranked candidate list of a run.
pub trait CandidateExporter: Send + Sync {
    fn export(&self, key: &MarketKey, candidates: &[Candidate]) -> Result<()>;
}
