pub mod in_memory;

pub use in_memory::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
    InMemoryOptimizationRunRepository,
};
