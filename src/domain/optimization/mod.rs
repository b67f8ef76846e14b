pub mod active_record;
pub mod cycle_lease;
pub mod cycle_outcome;
pub mod metrics;
pub mod optimization_run;
pub mod parameter_grid;
pub mod parameter_set;
pub mod promotion;
pub mod quality_gate;
pub mod staleness;

pub use active_record::ActiveRecord;
pub use cycle_lease::{CycleLease, LeaseAcquisition};
pub use cycle_outcome::{Acceptance, CycleOutcome, RejectionReason, TriggerReason};
pub use metrics::{BacktestMetrics, Candidate, RankingMetric};
pub use optimization_run::OptimizationRun;
pub use parameter_grid::ParameterGrid;
pub use parameter_set::{ParameterSet, ParameterValue};
pub use promotion::{ImprovementThresholds, PromotionDecision, PromotionPolicy};
pub use quality_gate::{GateSelection, QualityGate, QualityThresholds};
pub use staleness::{CandleDataGate, Freshness, StalenessDecision};
