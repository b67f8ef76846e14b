use thiserror::Error;

/// Failure kinds of a single reoptimization cycle.
///
/// Every variant is recovered inside the scheduler; none of them stop the loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReoptimizationError {
    #[error("Candle freshness unknown for {key}: {reason}")]
    DataUnavailable { key: String, reason: String },

    #[error("Insufficient data: need {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Optimizer exceeded timeout of {timeout_secs}s")]
    OptimizerTimeout { timeout_secs: u64 },

    #[error("Optimizer failed: {0}")]
    Optimizer(String),

    #[error("No candidate cleared the quality gate ({evaluated} evaluated, fallback disabled)")]
    GateRejected { evaluated: usize },

    #[error(
        "Candidate not improved enough: return delta {return_delta:.4} (min {min_return:.4}), sharpe delta {sharpe_delta:.4} (min {min_sharpe:.4})"
    )]
    NotImproved {
        return_delta: f64,
        sharpe_delta: f64,
        min_return: f64,
        min_sharpe: f64,
    },

    #[error("Failed to persist active record after {attempts} attempts: {reason}")]
    PersistenceFailure { attempts: u32, reason: String },

    #[error("Version regression: stored v{current}, attempted v{attempted}")]
    VersionRegression { current: u64, attempted: u64 },

    #[error("Cycle lease for {key} is held by {holder}")]
    LeaseHeld { key: String, holder: String },

    #[error("Cycle cancelled by shutdown")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_improved_formatting() {
        let err = ReoptimizationError::NotImproved {
            return_delta: 0.1,
            sharpe_delta: 0.2,
            min_return: 0.25,
            min_sharpe: 0.15,
        };

        let msg = err.to_string();
        assert!(msg.contains("0.1000"));
        assert!(msg.contains("min 0.2500"));
    }

    #[test]
    fn test_insufficient_data_formatting() {
        let err = ReoptimizationError::InsufficientData {
            required: 201,
            available: 50,
        };

        let msg = err.to_string();
        assert!(msg.contains("201"));
        assert!(msg.contains("50"));
    }
}
