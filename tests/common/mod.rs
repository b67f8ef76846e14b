#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reoptimizer::application::optimization::{
    CyclePolicies, ReoptimizationPorts, ReoptimizationService, ReoptimizationSettings,
};
use reoptimizer::domain::errors::ReoptimizationError;
use reoptimizer::domain::market::{MarketKey, Timeframe};
use reoptimizer::domain::optimization::{
    ActiveRecord, BacktestMetrics, Candidate, CandleDataGate, ImprovementThresholds, ParameterSet,
    ParameterValue, PromotionPolicy, QualityGate, QualityThresholds,
};
use reoptimizer::domain::ports::{OptimizationReport, OptimizationRequest, Optimizer};
use reoptimizer::domain::repositories::{
    ActiveRecordRepository, CycleLeaseRepository, OptimizationRunRepository, ReplaceOutcome,
};
use reoptimizer::infrastructure::freshness::ActiveSnapshotFreshness;
use reoptimizer::infrastructure::repositories::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn key() -> MarketKey {
    MarketKey::new("BTCUSDC", Timeframe::FifteenMin)
}

pub fn candidate(tag: i64, return_pct: f64, sharpe: f64, max_drawdown_pct: f64) -> Candidate {
    let values = BTreeMap::from([("tag".to_string(), ParameterValue::Int(tag))]);
    Candidate::new(
        ParameterSet::draft(key(), "rsi_sma", values),
        BacktestMetrics::new(return_pct, sharpe, max_drawdown_pct, 10),
    )
}

pub fn tag_of(parameters: &ParameterSet) -> i64 {
    parameters
        .get("tag")
        .and_then(|v| v.as_i64())
        .expect("candidate built by candidate() carries a tag")
}

pub fn active_record(version: u64, return_pct: f64, sharpe: f64, data_end: DateTime<Utc>) -> ActiveRecord {
    let values = BTreeMap::from([("tag".to_string(), ParameterValue::Int(0))]);
    let params = ParameterSet::draft(key(), "rsi_sma", values).promote(version, data_end);
    ActiveRecord::new(
        params,
        BacktestMetrics::new(return_pct, sharpe, -5.0, 10),
        data_end,
        data_end,
    )
}

/// Optimizer returning a fixed result, optionally after a delay on the tokio clock.
pub struct ScriptedOptimizer {
    result: Result<Vec<Candidate>, ReoptimizationError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedOptimizer {
    pub fn returning(candidates: Vec<Candidate>) -> Self {
        Self {
            result: Ok(candidates),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: ReoptimizationError) -> Self {
        Self {
            result: Err(err),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Optimizer for ScriptedOptimizer {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationReport, ReoptimizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let candidates = self.result.clone()?;
        Ok(OptimizationReport {
            candidates,
            data_end: Utc::now(),
            candles_used: request.window,
        })
    }
}

/// Active record store whose first `failures` writes error out.
pub struct FlakyRecords {
    inner: InMemoryActiveRecordRepository,
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyRecords {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryActiveRecordRepository::new(),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActiveRecordRepository for FlakyRecords {
    async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>> {
        self.inner.get_active(key).await
    }

    async fn replace(&self, record: &ActiveRecord) -> Result<ReplaceOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("disk full");
        }
        self.inner.replace(record).await
    }

    async fn list_active(&self) -> Result<Vec<Arc<ActiveRecord>>> {
        self.inner.list_active().await
    }
}

pub fn settings() -> ReoptimizationSettings {
    ReoptimizationSettings {
        window: 500,
        optimizer_timeout: Duration::from_secs(60),
        lease_ttl: Duration::from_secs(120),
        persist_max_attempts: 3,
        persist_base_delay_ms: 10,
        ..ReoptimizationSettings::default()
    }
}

pub fn policies(
    stale_minutes: i64,
    quality: QualityThresholds,
    improvement: ImprovementThresholds,
) -> CyclePolicies {
    CyclePolicies {
        staleness: CandleDataGate::new(chrono::Duration::minutes(stale_minutes)),
        quality: QualityGate::new(quality),
        promotion: PromotionPolicy::new(improvement),
    }
}

pub fn default_policies() -> CyclePolicies {
    policies(60, QualityThresholds::default(), ImprovementThresholds::default())
}

/// Service over the given optimizer and store, freshness read back from the
/// store and, when given, the run history.
pub fn service_with(
    optimizer: Arc<dyn Optimizer>,
    records: Arc<dyn ActiveRecordRepository>,
    leases: Arc<dyn CycleLeaseRepository>,
    runs: Option<Arc<dyn OptimizationRunRepository>>,
    settings: ReoptimizationSettings,
    policies: CyclePolicies,
) -> ReoptimizationService {
    let mut freshness = ActiveSnapshotFreshness::new(records.clone());
    if let Some(runs) = &runs {
        freshness = freshness.with_runs(runs.clone());
    }
    ReoptimizationService::new(
        settings,
        policies,
        ReoptimizationPorts {
            optimizer,
            freshness: Arc::new(freshness),
            active_records: records,
            leases,
            runs,
            exporter: None,
        },
    )
}

pub fn service(
    optimizer: Arc<dyn Optimizer>,
    records: Arc<dyn ActiveRecordRepository>,
    policies: CyclePolicies,
) -> ReoptimizationService {
    service_with(
        optimizer,
        records,
        Arc::new(InMemoryCycleLeaseRepository::new()),
        None,
        settings(),
        policies,
    )
}
