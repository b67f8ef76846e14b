pub mod database;
pub mod json_store;
pub mod repositories;

pub use database::Database;
pub use json_store::{JsonFileActiveRecordRepository, JsonFileOptimizationRunRepository};
