use super::cycle_outcome::Acceptance;
use super::metrics::{BacktestMetrics, Candidate};

/// Absolute floor every promoted candidate has to clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_return_pct: f64,
    pub min_sharpe: f64,
    /// Compared by magnitude: `20` and `-20` mean the same limit.
    pub max_drawdown_pct: f64,
    pub allow_fallback: bool,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_return_pct: 0.0,
            min_sharpe: 0.0,
            max_drawdown_pct: 20.0,
            allow_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateSelection {
    pub candidate: Candidate,
    pub acceptance: Acceptance,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// NaN in any metric fails the check.
    pub fn passes(&self, metrics: &BacktestMetrics) -> bool {
        metrics.return_pct >= self.thresholds.min_return_pct
            && metrics.sharpe >= self.thresholds.min_sharpe
            && metrics.drawdown_magnitude() <= self.thresholds.max_drawdown_pct.abs()
    }

    /// Picks the first passing candidate in ranked order. When none pass and
    /// fallback is allowed, the top-ranked candidate is returned marked
    /// [`Acceptance::FallbackAccepted`].
    pub fn filter(&self, ranked: &[Candidate]) -> Option<GateSelection> {
        if let Some(candidate) = ranked.iter().find(|c| self.passes(&c.metrics)) {
            return Some(GateSelection {
                candidate: candidate.clone(),
                acceptance: Acceptance::Passed,
            });
        }

        if self.thresholds.allow_fallback {
            return ranked.first().map(|candidate| GateSelection {
                candidate: candidate.clone(),
                acceptance: Acceptance::FallbackAccepted,
            });
        }

        None
    }
}
