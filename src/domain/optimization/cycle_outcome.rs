use crate::domain::errors::ReoptimizationError;
use crate::domain::market::MarketKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a cycle went on to optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    Forced,
    StaleData,
    ColdStart,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Forced => write!(f, "forced"),
            TriggerReason::StaleData => write!(f, "stale-data"),
            TriggerReason::ColdStart => write!(f, "cold-start"),
        }
    }
}

/// How the selected candidate got through the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acceptance {
    Passed,
    FallbackAccepted,
}

impl fmt::Display for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acceptance::Passed => write!(f, "passed"),
            Acceptance::FallbackAccepted => write!(f, "fallback-accepted"),
        }
    }
}

/// Reason a cycle ended without promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    NotBetter,
    GateFailed,
    InsufficientData,
    OptimizerTimeout,
    OptimizerFailed,
    DataUnavailable,
    PersistenceFailure,
    LeaseHeld,
    Cancelled,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::NotBetter => "not-better",
            RejectionReason::GateFailed => "gate-failed",
            RejectionReason::InsufficientData => "insufficient-data",
            RejectionReason::OptimizerTimeout => "optimizer-timeout",
            RejectionReason::OptimizerFailed => "optimizer-failed",
            RejectionReason::DataUnavailable => "data-unavailable",
            RejectionReason::PersistenceFailure => "persistence-failure",
            RejectionReason::LeaseHeld => "lease-held",
            RejectionReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ReoptimizationError> for RejectionReason {
    fn from(err: &ReoptimizationError) -> Self {
        match err {
            ReoptimizationError::DataUnavailable { .. } => RejectionReason::DataUnavailable,
            ReoptimizationError::InsufficientData { .. } => RejectionReason::InsufficientData,
            ReoptimizationError::OptimizerTimeout { .. } => RejectionReason::OptimizerTimeout,
            ReoptimizationError::Optimizer(_) => RejectionReason::OptimizerFailed,
            ReoptimizationError::GateRejected { .. } => RejectionReason::GateFailed,
            ReoptimizationError::NotImproved { .. } => RejectionReason::NotBetter,
            ReoptimizationError::PersistenceFailure { .. }
            | ReoptimizationError::VersionRegression { .. } => RejectionReason::PersistenceFailure,
            ReoptimizationError::LeaseHeld { .. } => RejectionReason::LeaseHeld,
            ReoptimizationError::Cancelled => RejectionReason::Cancelled,
        }
    }
}

/// Result of one scheduler iteration. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub key: MarketKey,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub triggered: bool,
    pub trigger: Option<TriggerReason>,
    /// Free-form explanation: the trigger, the skip reason or the error text.
    pub reason: String,
    pub candidate_considered: bool,
    pub acceptance: Option<Acceptance>,
    pub promoted: bool,
    pub promoted_version: Option<u64>,
    pub rejection_reason: Option<RejectionReason>,
    pub degraded: bool,
}

impl CycleOutcome {
    pub fn begin(key: MarketKey, started_at: DateTime<Utc>) -> Self {
        Self {
            key,
            started_at,
            finished_at: started_at,
            triggered: false,
            trigger: None,
            reason: String::new(),
            candidate_considered: false,
            acceptance: None,
            promoted: false,
            promoted_version: None,
            rejection_reason: None,
            degraded: false,
        }
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self.finished_at = Utc::now();
        self
    }

    pub fn rejected(mut self, err: &ReoptimizationError) -> Self {
        self.rejection_reason = Some(RejectionReason::from(err));
        self.degraded = matches!(err, ReoptimizationError::DataUnavailable { .. });
        self.reason = err.to_string();
        self.finished_at = Utc::now();
        self
    }

    pub fn promoted(mut self, version: u64) -> Self {
        self.promoted = true;
        self.promoted_version = Some(version);
        self.finished_at = Utc::now();
        self
    }

    /// Short label used for metrics and the per-cycle log line.
    pub fn label(&self) -> &'static str {
        if self.promoted {
            "promoted"
        } else if let Some(reason) = self.rejection_reason {
            reason.as_str()
        } else {
            "skipped"
        }
    }
}
