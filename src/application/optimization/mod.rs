pub mod optimizer;
pub mod reoptimization_service;
pub mod scheduler;
pub mod simulator;
pub mod strategy;

pub use optimizer::GridSearchOptimizer;
pub use reoptimization_service::{
    CyclePolicies, ReoptimizationPorts, ReoptimizationService, ReoptimizationSettings,
};
pub use scheduler::{ReoptimizationScheduler, SchedulerHandle, SchedulerSummary};
