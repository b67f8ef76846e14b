use super::metrics::Candidate;
use crate::domain::market::MarketKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of a finished optimizer run and its best candidate.
///
/// Appended whether or not the candidate was promoted. A run is `settled`
/// once its verdict stands (promoted, not better, gate rejected); a run whose
/// promotion could not be written stays unsettled so the next tick retries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: Option<i64>,
    pub key: MarketKey,
    pub ran_at: DateTime<Utc>,
    pub data_end: DateTime<Utc>,
    pub evaluated: usize,
    pub best: Candidate,
    pub promoted_version: Option<u64>,
    #[serde(default = "settled_by_default")]
    pub settled: bool,
}

fn settled_by_default() -> bool {
    true
}

impl OptimizationRun {
    pub fn new(
        key: MarketKey,
        data_end: DateTime<Utc>,
        evaluated: usize,
        best: Candidate,
        promoted_version: Option<u64>,
    ) -> Self {
        Self {
            id: None,
            key,
            ran_at: Utc::now(),
            data_end,
            evaluated,
            best,
            promoted_version,
            settled: true,
        }
    }

    pub fn unsettled(mut self) -> Self {
        self.settled = false;
        self
    }
}
