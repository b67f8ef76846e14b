//! Prometheus metrics definitions for the reoptimizer
//!
//! All metrics use the `reopt_` prefix and are read-only.

use crate::domain::market::MarketKey;
use crate::domain::optimization::CycleOutcome;
use prometheus::{
    CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry,
    TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

/// Prometheus metrics for the reoptimization loop
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Finished cycles by outcome label
    pub cycles_total: CounterVec,
    /// Successful promotions
    pub promotions_total: IntCounter,
    /// Version of the active parameter set per key
    pub active_version: GenericGaugeVec<AtomicF64>,
    /// Wall time spent in the optimizer
    pub optimizer_seconds: Histogram,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles_total = CounterVec::new(
            Opts::new("reopt_cycles_total", "Finished reoptimization cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(cycles_total.clone()))?;

        let promotions_total = IntCounter::with_opts(Opts::new(
            "reopt_promotions_total",
            "Parameter sets promoted to active",
        ))?;
        registry.register(Box::new(promotions_total.clone()))?;

        let active_version = GaugeVec::new(
            Opts::new(
                "reopt_active_version",
                "Version of the active parameter set",
            ),
            &["symbol", "timeframe"],
        )?;
        registry.register(Box::new(active_version.clone()))?;

        let optimizer_seconds = Histogram::with_opts(
            HistogramOpts::new("reopt_optimizer_seconds", "Optimizer run time in seconds")
                .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]),
        )?;
        registry.register(Box::new(optimizer_seconds.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "reopt_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cycles_total,
            promotions_total,
            active_version,
            optimizer_seconds,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn record_cycle(&self, outcome: &CycleOutcome) {
        self.cycles_total
            .with_label_values(&[outcome.label()])
            .inc();
        if outcome.promoted {
            self.promotions_total.inc();
        }
    }

    pub fn set_active_version(&self, key: &MarketKey, version: u64) {
        self.active_version
            .with_label_values(&[key.symbol.as_str(), key.timeframe.as_str()])
            .set(version as f64);
    }

    pub fn observe_optimizer(&self, seconds: f64) {
        self.optimizer_seconds.observe(seconds);
    }

    pub fn cycles(&self, label: &str) -> f64 {
        self.cycles_total.with_label_values(&[label]).get()
    }
}
