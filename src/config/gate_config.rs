use super::env::{Lookup, parse_or};
use crate::domain::optimization::{ImprovementThresholds, QualityThresholds};
use anyhow::Result;

/// Quality gate and promotion thresholds.
#[derive(Debug, Clone, Default)]
pub struct GateEnvConfig {
    pub quality: QualityThresholds,
    pub improvement: ImprovementThresholds,
}

impl GateEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let quality = QualityThresholds {
            min_return_pct: parse_or(lookup, "REOPT_MIN_RETURN_PCT", 0.0)?,
            min_sharpe: parse_or(lookup, "REOPT_MIN_SHARPE", 0.0)?,
            max_drawdown_pct: parse_or(lookup, "REOPT_MAX_DD_PCT", 20.0)?,
            allow_fallback: parse_or(lookup, "REOPT_ALLOW_FALLBACK", false)?,
        };
        let improvement = ImprovementThresholds {
            min_improve_return: parse_or(lookup, "REOPT_MIN_IMPROVE_RETURN", 0.2)?,
            min_improve_sharpe: parse_or(lookup, "REOPT_MIN_IMPROVE_SHARPE", 0.0)?,
        };
        Ok(Self {
            quality,
            improvement,
        })
    }
}
