use super::parameter_set::ParameterSet;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Backtest summary attached to a parameter set at evaluation time.
///
/// `max_drawdown_pct` may arrive signed either way; consumers compare
/// [`BacktestMetrics::drawdown_magnitude`] only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub return_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub sample_size: u64,
}

impl BacktestMetrics {
    pub fn new(return_pct: f64, sharpe: f64, max_drawdown_pct: f64, sample_size: u64) -> Self {
        Self {
            return_pct,
            sharpe,
            max_drawdown_pct,
            sample_size,
        }
    }

    pub fn drawdown_magnitude(&self) -> f64 {
        self.max_drawdown_pct.abs()
    }
}

/// A draft parameter set and the metrics it scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub parameters: ParameterSet,
    pub metrics: BacktestMetrics,
}

impl Candidate {
    pub fn new(parameters: ParameterSet, metrics: BacktestMetrics) -> Self {
        Self {
            parameters,
            metrics,
        }
    }
}

/// Primary metric used to rank optimizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankingMetric {
    #[default]
    ReturnPct,
    Sharpe,
}

impl RankingMetric {
    /// Total order, best first: primary metric desc, the other metric desc,
    /// drawdown magnitude asc, then canonical parameter rendering.
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let (a1, a2, b1, b2) = match self {
            RankingMetric::ReturnPct => (
                a.metrics.return_pct,
                a.metrics.sharpe,
                b.metrics.return_pct,
                b.metrics.sharpe,
            ),
            RankingMetric::Sharpe => (
                a.metrics.sharpe,
                a.metrics.return_pct,
                b.metrics.sharpe,
                b.metrics.return_pct,
            ),
        };

        b1.total_cmp(&a1)
            .then_with(|| b2.total_cmp(&a2))
            .then_with(|| {
                a.metrics
                    .drawdown_magnitude()
                    .total_cmp(&b.metrics.drawdown_magnitude())
            })
            .then_with(|| a.parameters.describe().cmp(&b.parameters.describe()))
    }

    pub fn rank(&self, candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for RankingMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "return" | "return_pct" | "returnpct" => Ok(RankingMetric::ReturnPct),
            "sharpe" => Ok(RankingMetric::Sharpe),
            _ => Err(anyhow!(
                "Invalid ranking metric: {}. Must be 'return' or 'sharpe'",
                s
            )),
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMetric::ReturnPct => write!(f, "return"),
            RankingMetric::Sharpe => write!(f, "sharpe"),
        }
    }
}
