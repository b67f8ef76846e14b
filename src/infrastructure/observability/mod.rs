//! Push-based observability for the reoptimizer
//!
//! This module provides observability through **outbound data only** - no HTTP server,
//! no incoming requests. Metrics are pushed as periodic JSON lines on stdout
//! (`METRICS_JSON:` prefix) for Loki, Fluentd or CloudWatch to pick up.

pub mod logging;
pub mod metrics;
pub mod reporter;

pub use logging::init_tracing;
pub use metrics::Metrics;
pub use reporter::MetricsReporter;
