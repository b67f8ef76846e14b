// Wiring of storage, market data and the cycle service from configuration
pub mod bootstrap;

// Reoptimization cycle, scheduler and the built-in grid optimizer
pub mod optimization;

// System orchestrator
pub mod system;
