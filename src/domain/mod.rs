// Candles, market keys and timeframes
pub mod market;

// Reoptimization domain: parameter sets, gates and promotion
pub mod optimization;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
