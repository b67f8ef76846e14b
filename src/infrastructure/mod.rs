pub mod candidate_export;
pub mod freshness;
pub mod http_client_factory;
pub mod market_data;
pub mod observability;
pub mod persistence;
pub mod repositories;

pub use candidate_export::CsvCandidateExporter;
pub use freshness::ActiveSnapshotFreshness;
