//! Candidate vs. active comparison.
//!
//! Rules, in order:
//! 1. no active record: promote
//! 2. both improvement thresholds zero: promote unless strictly worse on
//!    return *and* sharpe
//! 3. otherwise both deltas must reach their thresholds

use super::active_record::ActiveRecord;
use super::metrics::BacktestMetrics;
use crate::domain::errors::ReoptimizationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImprovementThresholds {
    pub min_improve_return: f64,
    pub min_improve_sharpe: f64,
}

impl Default for ImprovementThresholds {
    fn default() -> Self {
        Self {
            min_improve_return: 0.2,
            min_improve_sharpe: 0.0,
        }
    }
}

impl ImprovementThresholds {
    pub fn disabled(&self) -> bool {
        self.min_improve_return == 0.0 && self.min_improve_sharpe == 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromotionDecision {
    /// Promote as `version`.
    Promote { version: u64 },
    Reject(ReoptimizationError),
}

#[derive(Debug, Clone, Copy)]
pub struct PromotionPolicy {
    thresholds: ImprovementThresholds,
}

impl PromotionPolicy {
    pub fn new(thresholds: ImprovementThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ImprovementThresholds {
        &self.thresholds
    }

    pub fn decide(
        &self,
        candidate: &BacktestMetrics,
        active: Option<&ActiveRecord>,
    ) -> PromotionDecision {
        let Some(active) = active else {
            return PromotionDecision::Promote { version: 1 };
        };

        let next = PromotionDecision::Promote {
            version: active.version() + 1,
        };
        let return_delta = candidate.return_pct - active.metrics.return_pct;
        let sharpe_delta = candidate.sharpe - active.metrics.sharpe;

        let promote = if self.thresholds.disabled() {
            !(return_delta < 0.0 && sharpe_delta < 0.0)
        } else {
            return_delta >= self.thresholds.min_improve_return
                && sharpe_delta >= self.thresholds.min_improve_sharpe
        };

        if promote {
            next
        } else {
            PromotionDecision::Reject(ReoptimizationError::NotImproved {
                return_delta,
                sharpe_delta,
                min_return: self.thresholds.min_improve_return,
                min_sharpe: self.thresholds.min_improve_sharpe,
            })
        }
    }
}
