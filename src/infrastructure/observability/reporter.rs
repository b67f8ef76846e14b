//! Push-based metrics reporter for the reoptimizer
//!
//! Periodically outputs the active parameter sets and cycle counters as
//! structured JSON to stdout.
//!
//! **Security**: This system only SENDS data, never accepts requests.

use crate::domain::repositories::ActiveRecordRepository;
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub active: Vec<ActiveSnapshot>,
    pub cycles: CycleSnapshot,
}

#[derive(Serialize)]
pub struct ActiveSnapshot {
    pub symbol: String,
    pub timeframe: String,
    pub version: u64,
    pub parameters: String,
    pub return_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub last_evaluated_at: String,
}

#[derive(Serialize)]
pub struct CycleSnapshot {
    pub promoted: f64,
    pub skipped: f64,
    pub promotions_total: u64,
}

/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    active_records: Arc<dyn ActiveRecordRepository>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(
        active_records: Arc<dyn ActiveRecordRepository>,
        metrics: Metrics,
        interval_seconds: u64,
    ) -> Self {
        Self {
            active_records,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// Run the reporter until shutdown, outputting metrics periodically
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        // Special prefix so logs can be easily filtered
                        println!("METRICS_JSON:{}", json);
                        info!(
                            "Active keys: {} | Promotions: {} | Uptime: {}s",
                            snapshot.active.len(),
                            snapshot.cycles.promotions_total,
                            snapshot.uptime_seconds
                        );
                    }
                    Err(e) => warn!("Failed to serialize metrics: {}", e),
                },
                Err(e) => warn!("Failed to collect metrics: {}", e),
            }
        }

        info!("MetricsReporter: stopped");
    }

    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let active = self
            .active_records
            .list_active()
            .await?
            .iter()
            .map(|record| {
                self.metrics.set_active_version(&record.key, record.version());
                ActiveSnapshot {
                    symbol: record.key.symbol.clone(),
                    timeframe: record.key.timeframe.to_string(),
                    version: record.version(),
                    parameters: record.parameters.describe(),
                    return_pct: record.metrics.return_pct,
                    sharpe: record.metrics.sharpe,
                    max_drawdown_pct: record.metrics.max_drawdown_pct,
                    last_evaluated_at: record.last_evaluated_at.to_rfc3339(),
                }
            })
            .collect();

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            active,
            cycles: CycleSnapshot {
                promoted: self.metrics.cycles("promoted"),
                skipped: self.metrics.cycles("skipped"),
                promotions_total: self.metrics.promotions_total.get(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryActiveRecordRepository;

    #[tokio::test]
    async fn test_metrics_snapshot_collection() {
        let repo = Arc::new(InMemoryActiveRecordRepository::new());
        let metrics = Metrics::new().expect("Failed to create metrics");
        let reporter = MetricsReporter::new(repo, metrics, 60);

        let snapshot = reporter
            .collect_snapshot()
            .await
            .expect("Failed to collect snapshot");

        assert!(snapshot.active.is_empty());
        assert!(!snapshot.timestamp.is_empty());
        assert!(serde_json::to_string(&snapshot).unwrap().contains("\"promotions_total\":0"));
    }
}
