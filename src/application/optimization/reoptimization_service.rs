//! One reoptimization cycle for one market key.
//!
//! Steps: lease, staleness check, optimizer (bounded by a timeout and raced
//! against shutdown), quality gate, promotion decision, persist with retry.
//! Every failure ends the cycle with a [`CycleOutcome`]; nothing propagates
//! out of [`ReoptimizationService::run_cycle`].

use crate::domain::errors::ReoptimizationError;
use crate::domain::market::MarketKey;
use crate::domain::optimization::{
    Acceptance, ActiveRecord, CandleDataGate, CycleOutcome, Freshness, LeaseAcquisition,
    OptimizationRun, ParameterGrid, PromotionDecision, PromotionPolicy, QualityGate,
    RankingMetric, StalenessDecision,
};
use crate::domain::ports::{
    CandidateExporter, CandleFreshnessSource, OptimizationReport, OptimizationRequest, Optimizer,
};
use crate::domain::repositories::{
    ActiveRecordRepository, CycleLeaseRepository, OptimizationRunRepository, ReplaceOutcome,
};
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReoptimizationSettings {
    pub window: usize,
    pub grid: ParameterGrid,
    pub ranking: RankingMetric,
    pub optimizer_timeout: Duration,
    pub lease_ttl: Duration,
    pub persist_max_attempts: u32,
    pub persist_base_delay_ms: u64,
}

impl Default for ReoptimizationSettings {
    fn default() -> Self {
        Self {
            window: 5000,
            grid: ParameterGrid::default(),
            ranking: RankingMetric::ReturnPct,
            optimizer_timeout: Duration::from_secs(900),
            lease_ttl: Duration::from_secs(1800),
            persist_max_attempts: 3,
            persist_base_delay_ms: 500,
        }
    }
}

/// The three decision components of a cycle.
#[derive(Debug, Clone, Copy)]
pub struct CyclePolicies {
    pub staleness: CandleDataGate,
    pub quality: QualityGate,
    pub promotion: PromotionPolicy,
}

/// Collaborators the cycle talks to.
#[derive(Clone)]
pub struct ReoptimizationPorts {
    pub optimizer: Arc<dyn Optimizer>,
    pub freshness: Arc<dyn CandleFreshnessSource>,
    pub active_records: Arc<dyn ActiveRecordRepository>,
    pub leases: Arc<dyn CycleLeaseRepository>,
    pub runs: Option<Arc<dyn OptimizationRunRepository>>,
    pub exporter: Option<Arc<dyn CandidateExporter>>,
}

pub struct ReoptimizationService {
    instance_id: String,
    settings: ReoptimizationSettings,
    policies: CyclePolicies,
    ports: ReoptimizationPorts,
    metrics: Option<Metrics>,
}

impl ReoptimizationService {
    pub fn new(
        settings: ReoptimizationSettings,
        policies: CyclePolicies,
        ports: ReoptimizationPorts,
    ) -> Self {
        Self {
            instance_id: format!("reopt-{}", std::process::id()),
            settings,
            policies,
            ports,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &ReoptimizationSettings {
        &self.settings
    }

    /// Read-only accessor for the live-trading side.
    pub async fn get_active(&self, key: &MarketKey) -> Result<Option<Arc<ActiveRecord>>> {
        self.ports.active_records.get_active(key).await
    }

    /// Runs one full cycle under the key's lease.
    pub async fn run_cycle(
        &self,
        key: &MarketKey,
        force: bool,
        shutdown: &watch::Receiver<bool>,
    ) -> CycleOutcome {
        let outcome = CycleOutcome::begin(key.clone(), Utc::now());

        let outcome = if *shutdown.borrow() {
            outcome.rejected(&ReoptimizationError::Cancelled)
        } else {
            // Fresh holder per cycle so two cycles in one process still exclude each other.
            let holder = format!("{}:{}", self.instance_id, Uuid::new_v4());
            let ttl = chrono::Duration::from_std(self.settings.lease_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800));

            match self
                .ports
                .leases
                .try_acquire(key, &holder, ttl, Utc::now())
                .await
            {
                Ok(LeaseAcquisition::Acquired(_)) => {
                    let outcome = self.run_locked(key, force, shutdown, outcome).await;
                    if let Err(e) = self.ports.leases.release(key, &holder).await {
                        warn!("ReoptimizationService: failed to release lease for {}: {:#}", key, e);
                    }
                    outcome
                }
                Ok(LeaseAcquisition::Held { holder, expires_at }) => {
                    info!(
                        "ReoptimizationService: {} busy, lease held by {} until {}",
                        key, holder, expires_at
                    );
                    outcome.rejected(&ReoptimizationError::LeaseHeld {
                        key: key.to_string(),
                        holder,
                    })
                }
                Err(e) => outcome.rejected(&ReoptimizationError::PersistenceFailure {
                    attempts: 1,
                    reason: format!("lease acquisition failed: {:#}", e),
                }),
            }
        };

        self.report(&outcome);
        outcome
    }

    async fn run_locked(
        &self,
        key: &MarketKey,
        force: bool,
        shutdown: &watch::Receiver<bool>,
        mut outcome: CycleOutcome,
    ) -> CycleOutcome {
        let freshness = match self.ports.freshness.freshness(key).await {
            Ok(Some(snapshot)) => Freshness::Known {
                last_data_at: snapshot.last_data_at,
                last_evaluated_at: Some(snapshot.last_evaluated_at),
            },
            Ok(None) => Freshness::ColdStart,
            Err(e) => Freshness::Unavailable(format!("{:#}", e)),
        };

        match self.policies.staleness.evaluate(Utc::now(), &freshness, force) {
            StalenessDecision::Run(trigger) => {
                outcome.triggered = true;
                outcome.trigger = Some(trigger);
                outcome.reason = trigger.to_string();
            }
            StalenessDecision::Skip { data_age, .. } => {
                return outcome.skipped(format!(
                    "data age {}m below stale threshold {}m",
                    data_age.num_minutes(),
                    self.policies.staleness.stale_threshold().num_minutes()
                ));
            }
            StalenessDecision::DataUnknown(reason) => {
                return outcome.rejected(&ReoptimizationError::DataUnavailable {
                    key: key.to_string(),
                    reason,
                });
            }
        }

        if *shutdown.borrow() {
            return outcome.rejected(&ReoptimizationError::Cancelled);
        }

        let report = match self.optimize(key, shutdown).await {
            Ok(report) => report,
            Err(e) => return outcome.rejected(&e),
        };
        let evaluated = report.candidates.len();

        let Some(selection) = self.policies.quality.filter(&report.candidates) else {
            self.record_run(key, &report, None, true).await;
            return outcome.rejected(&ReoptimizationError::GateRejected { evaluated });
        };
        outcome.candidate_considered = true;
        outcome.acceptance = Some(selection.acceptance);

        if selection.acceptance == Acceptance::FallbackAccepted {
            warn!(
                "ReoptimizationService: no candidate for {} cleared the quality gate, falling back to top-ranked {}",
                key,
                selection.candidate.parameters.describe()
            );
        }

        let active = match self.ports.active_records.get_active(key).await {
            Ok(active) => active,
            Err(e) => {
                return outcome.rejected(&ReoptimizationError::DataUnavailable {
                    key: key.to_string(),
                    reason: format!("cannot read active record: {:#}", e),
                });
            }
        };

        let version = match self
            .policies
            .promotion
            .decide(&selection.candidate.metrics, active.as_deref())
        {
            PromotionDecision::Promote { version } => version,
            PromotionDecision::Reject(err) => {
                self.record_run(key, &report, None, true).await;
                return outcome.rejected(&err);
            }
        };

        // Last safe point: past here the write runs to completion.
        if *shutdown.borrow() {
            return outcome.rejected(&ReoptimizationError::Cancelled);
        }

        let now = Utc::now();
        let record = ActiveRecord::new(
            selection.candidate.parameters.promote(version, now),
            selection.candidate.metrics,
            report.data_end,
            now,
        );

        match self.persist(&record).await {
            Ok(()) => {
                info!(
                    "ReoptimizationService: promoted {} v{} ({}) return {:.2}% sharpe {:.2} dd {:.2}%",
                    key,
                    version,
                    record.parameters.describe(),
                    record.metrics.return_pct,
                    record.metrics.sharpe,
                    record.metrics.max_drawdown_pct
                );
                if let Some(metrics) = &self.metrics {
                    metrics.set_active_version(key, version);
                }
                self.record_run(key, &report, Some(version), true).await;
                outcome.promoted(version)
            }
            Err(e) => {
                // Unsettled: the next tick retries instead of treating the data as evaluated
                self.record_run(key, &report, None, false).await;
                outcome.rejected(&e)
            }
        }
    }

    async fn optimize(
        &self,
        key: &MarketKey,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<OptimizationReport, ReoptimizationError> {
        let request = OptimizationRequest {
            key: key.clone(),
            window: self.settings.window,
            grid: self.settings.grid.clone(),
            ranking: self.settings.ranking,
        };
        let timeout = self.settings.optimizer_timeout;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown.clone()) => Err(ReoptimizationError::Cancelled),
            res = tokio::time::timeout(timeout, self.ports.optimizer.optimize(&request)) => match res {
                Ok(inner) => inner,
                Err(_) => Err(ReoptimizationError::OptimizerTimeout {
                    timeout_secs: timeout.as_secs(),
                }),
            },
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_optimizer(started.elapsed().as_secs_f64());
        }

        let report = result?;
        if report.candidates.is_empty() {
            return Err(ReoptimizationError::Optimizer(
                "optimizer returned no candidates".to_string(),
            ));
        }
        Ok(report)
    }

    /// Writes the record, retrying transient failures with exponential backoff.
    /// A stale-version answer is final.
    async fn persist(&self, record: &ActiveRecord) -> Result<(), ReoptimizationError> {
        let max_attempts = self.settings.persist_max_attempts.max(1);
        let base_delay_ms = self.settings.persist_base_delay_ms;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.ports.active_records.replace(record).await {
                Ok(ReplaceOutcome::Written) => return Ok(()),
                Ok(ReplaceOutcome::Stale { current }) => {
                    error!(
                        "ReoptimizationService: refusing to write {} v{}, store already at v{}",
                        record.key,
                        record.version(),
                        current
                    );
                    return Err(ReoptimizationError::VersionRegression {
                        current,
                        attempted: record.version(),
                    });
                }
                Err(e) => {
                    if attempts >= max_attempts {
                        error!(
                            "ReoptimizationService: FAILED to persist {} after {} attempts: {:#}",
                            record.key, attempts, e
                        );
                        return Err(ReoptimizationError::PersistenceFailure {
                            attempts,
                            reason: format!("{:#}", e),
                        });
                    }
                    let delay = backoff_delay_ms(base_delay_ms, attempts);
                    warn!(
                        "ReoptimizationService: persist attempt {}/{} for {} failed: {:#}. Retrying in {}ms",
                        attempts, max_attempts, record.key, e, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    async fn record_run(
        &self,
        key: &MarketKey,
        report: &OptimizationReport,
        promoted_version: Option<u64>,
        settled: bool,
    ) {
        let Some(best) = report.candidates.first() else {
            return;
        };

        if let Some(runs) = &self.ports.runs {
            let mut run = OptimizationRun::new(
                key.clone(),
                report.data_end,
                report.candidates.len(),
                best.clone(),
                promoted_version,
            );
            if !settled {
                run = run.unsettled();
            }
            if let Err(e) = runs.save(&run).await {
                warn!("ReoptimizationService: failed to record run for {}: {:#}", key, e);
            }
        }

        if let Some(exporter) = &self.ports.exporter
            && let Err(e) = exporter.export(key, &report.candidates)
        {
            warn!("ReoptimizationService: candidate export for {} failed: {:#}", key, e);
        }
    }

    fn report(&self, outcome: &CycleOutcome) {
        info!(
            key = %outcome.key,
            outcome = outcome.label(),
            triggered = outcome.triggered,
            trigger = ?outcome.trigger,
            candidate_considered = outcome.candidate_considered,
            acceptance = ?outcome.acceptance,
            promoted = outcome.promoted,
            version = ?outcome.promoted_version,
            degraded = outcome.degraded,
            elapsed_ms = (outcome.finished_at - outcome.started_at).num_milliseconds(),
            "Cycle finished: {}",
            outcome.reason
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(outcome);
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
/// saturating instead of overflowing on large attempt counts.
fn backoff_delay_ms(base_delay_ms: u64, attempt: u32) -> u64 {
    base_delay_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Resolves once the shutdown flag is set. Never resolves if the sender is gone.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
