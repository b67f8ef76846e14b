mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use reoptimizer::domain::errors::ReoptimizationError;
use reoptimizer::domain::optimization::{
    Acceptance, ImprovementThresholds, QualityThresholds, RejectionReason, TriggerReason,
};
use reoptimizer::domain::ports::{CandleFreshnessSource, FreshnessSnapshot};
use reoptimizer::domain::repositories::{ActiveRecordRepository, OptimizationRunRepository};
use reoptimizer::infrastructure::observability::Metrics;
use reoptimizer::infrastructure::repositories::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
    InMemoryOptimizationRunRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn running() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[tokio::test]
async fn test_cold_start_promotes_first_accepted_candidate() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![
        candidate(1, 4.0, 0.6, -8.0),
        candidate(2, 3.0, 0.9, -2.0),
    ]));
    let service = service(optimizer.clone(), records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.triggered);
    assert_eq!(outcome.trigger, Some(TriggerReason::ColdStart));
    assert!(outcome.candidate_considered);
    assert_eq!(outcome.acceptance, Some(Acceptance::Passed));
    assert!(outcome.promoted);
    assert_eq!(outcome.promoted_version, Some(1));

    let active = service.get_active(&key()).await.unwrap().unwrap();
    assert_eq!(active.version(), 1);
    assert_eq!(tag_of(&active.parameters), 1);
    assert_eq!(optimizer.calls(), 1);
}

#[tokio::test]
async fn test_cold_start_ignores_improvement_thresholds() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 0.5, 0.1, -1.0)]));
    let policies = policies(
        60,
        QualityThresholds::default(),
        ImprovementThresholds {
            min_improve_return: 100.0,
            min_improve_sharpe: 100.0,
        },
    );
    let service = service(optimizer, records, policies);
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;
    assert!(outcome.promoted);
    assert_eq!(outcome.promoted_version, Some(1));
}

#[tokio::test]
async fn test_improvement_scenario_promotes_next_version() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(4, 12.0, 1.1, Utc::now() - ChronoDuration::hours(3)))
        .await
        .unwrap();

    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(7, 12.3, 1.3, -6.0)]));
    let policies = policies(
        60,
        QualityThresholds::default(),
        ImprovementThresholds {
            min_improve_return: 0.25,
            min_improve_sharpe: 0.15,
        },
    );
    let service = service(optimizer, records.clone(), policies);
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert_eq!(outcome.trigger, Some(TriggerReason::StaleData));
    assert!(outcome.promoted);
    assert_eq!(outcome.promoted_version, Some(5));
    let active = records.get_active(&key()).await.unwrap().unwrap();
    assert_eq!(active.version(), 5);
    assert_eq!(tag_of(&active.parameters), 7);
}

#[tokio::test]
async fn test_return_delta_short_is_not_improved() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(4, 12.0, 1.1, Utc::now() - ChronoDuration::hours(3)))
        .await
        .unwrap();

    // Sharpe jumps far past its threshold; the return delta alone decides.
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(7, 12.1, 3.0, -6.0)]));
    let policies = policies(
        60,
        QualityThresholds::default(),
        ImprovementThresholds {
            min_improve_return: 0.25,
            min_improve_sharpe: 0.15,
        },
    );
    let runs = Arc::new(InMemoryOptimizationRunRepository::new());
    let service = service_with(
        optimizer,
        records.clone(),
        Arc::new(InMemoryCycleLeaseRepository::new()),
        Some(runs.clone()),
        settings(),
        policies,
    );
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(!outcome.promoted);
    assert!(outcome.candidate_considered);
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::NotBetter));
    assert!(outcome.reason.contains("return delta 0.1000"));
    assert_eq!(records.get_active(&key()).await.unwrap().unwrap().version(), 4);
    // The run is still recorded in history
    assert_eq!(runs.count().await, 1);
}

#[tokio::test]
async fn test_gate_rejection_without_fallback_leaves_record_untouched() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let before = active_record(2, 5.0, 0.5, Utc::now() - ChronoDuration::hours(3));
    records.replace(&before).await.unwrap();

    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![
        candidate(1, 30.0, 2.0, -45.0),
        candidate(2, -1.0, 1.0, -3.0),
    ]));
    let service = service(optimizer, records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.triggered);
    assert!(!outcome.promoted);
    assert!(!outcome.candidate_considered);
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::GateFailed));
    assert_eq!(
        records.get_active(&key()).await.unwrap().unwrap().as_ref(),
        &before
    );
}

#[tokio::test]
async fn test_declined_candidate_settles_stale_data_until_next_threshold() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(1, 12.0, 1.1, Utc::now() - ChronoDuration::hours(3)))
        .await
        .unwrap();

    // Same metrics as the active record: evaluated, but not an improvement
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(7, 12.0, 1.1, -3.0)]));
    let runs = Arc::new(InMemoryOptimizationRunRepository::new());
    let service = service_with(
        optimizer.clone(),
        records.clone(),
        Arc::new(InMemoryCycleLeaseRepository::new()),
        Some(runs.clone()),
        settings(),
        default_policies(),
    );
    let (_tx, rx) = running();

    let first = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(first.trigger, Some(TriggerReason::StaleData));
    assert_eq!(first.rejection_reason, Some(RejectionReason::NotBetter));

    let second = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(second.label(), "skipped");
    assert!(second.reason.contains("below stale threshold 60m"));
    assert_eq!(optimizer.calls(), 1);
    assert_eq!(runs.count().await, 1);
    assert_eq!(records.get_active(&key()).await.unwrap().unwrap().version(), 1);
}

#[tokio::test]
async fn test_gate_rejected_run_settles_stale_data() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(2, 5.0, 0.5, Utc::now() - ChronoDuration::hours(3)))
        .await
        .unwrap();

    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 30.0, 2.0, -45.0)]));
    let service = service_with(
        optimizer.clone(),
        records,
        Arc::new(InMemoryCycleLeaseRepository::new()),
        Some(Arc::new(InMemoryOptimizationRunRepository::new())),
        settings(),
        default_policies(),
    );
    let (_tx, rx) = running();

    let first = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(first.rejection_reason, Some(RejectionReason::GateFailed));

    let second = service.run_cycle(&key(), false, &rx).await;
    assert!(!second.triggered);
    assert_eq!(second.label(), "skipped");
    assert_eq!(optimizer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_retried_on_next_cycle() {
    let records = Arc::new(FlakyRecords::new(3));
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let runs = Arc::new(InMemoryOptimizationRunRepository::new());
    let service = service_with(
        optimizer.clone(),
        records.clone(),
        Arc::new(InMemoryCycleLeaseRepository::new()),
        Some(runs.clone()),
        settings(),
        default_policies(),
    );
    let (_tx, rx) = running();

    let first = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(first.rejection_reason, Some(RejectionReason::PersistenceFailure));

    // The unsettled run does not count as an evaluation: still a cold start
    let second = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(second.trigger, Some(TriggerReason::ColdStart));
    assert_eq!(second.promoted_version, Some(1));
    assert_eq!(optimizer.calls(), 2);

    let history = runs.find_by_key(&key(), 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].settled);
    assert!(!history[1].settled);
}

#[tokio::test]
async fn test_fallback_accepts_top_ranked_and_marks_outcome() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![
        candidate(1, 30.0, 2.0, -45.0),
        candidate(2, -1.0, 1.0, -3.0),
    ]));
    let policies = policies(
        60,
        QualityThresholds {
            allow_fallback: true,
            ..QualityThresholds::default()
        },
        ImprovementThresholds::default(),
    );
    let service = service(optimizer, records.clone(), policies);
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.promoted);
    assert_eq!(outcome.acceptance, Some(Acceptance::FallbackAccepted));
    let active = records.get_active(&key()).await.unwrap().unwrap();
    assert_eq!(tag_of(&active.parameters), 1);
}

#[tokio::test]
async fn test_fresh_data_skips_optimizer() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(3, 5.0, 0.5, Utc::now() - ChronoDuration::minutes(59)))
        .await
        .unwrap();

    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 50.0, 5.0, -1.0)]));
    let service = service(optimizer.clone(), records, default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(!outcome.triggered);
    assert!(!outcome.promoted);
    assert!(outcome.rejection_reason.is_none());
    assert_eq!(outcome.label(), "skipped");
    assert!(outcome.reason.contains("below stale threshold 60m"));
    assert_eq!(optimizer.calls(), 0);
}

#[tokio::test]
async fn test_force_overrides_fresh_data() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    records
        .replace(&active_record(3, 5.0, 0.5, Utc::now() - ChronoDuration::minutes(5)))
        .await
        .unwrap();

    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 50.0, 5.0, -1.0)]));
    let service = service(optimizer.clone(), records, default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), true, &rx).await;

    assert_eq!(outcome.trigger, Some(TriggerReason::Forced));
    assert_eq!(outcome.promoted_version, Some(4));
    assert_eq!(optimizer.calls(), 1);
}

struct BrokenFreshness;

#[async_trait::async_trait]
impl CandleFreshnessSource for BrokenFreshness {
    async fn freshness(
        &self,
        _key: &reoptimizer::domain::market::MarketKey,
    ) -> anyhow::Result<Option<FreshnessSnapshot>> {
        anyhow::bail!("exchange unreachable")
    }
}

#[tokio::test]
async fn test_unknown_freshness_is_degraded_not_skipped() {
    use reoptimizer::application::optimization::{ReoptimizationPorts, ReoptimizationService};

    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let service = ReoptimizationService::new(
        settings(),
        default_policies(),
        ReoptimizationPorts {
            optimizer: optimizer.clone(),
            freshness: Arc::new(BrokenFreshness),
            active_records: records,
            leases: Arc::new(InMemoryCycleLeaseRepository::new()),
            runs: None,
            exporter: None,
        },
    );
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.degraded);
    assert!(!outcome.triggered);
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::DataUnavailable));
    assert!(outcome.reason.contains("exchange unreachable"));
    assert_eq!(optimizer.calls(), 0);
}

#[tokio::test]
async fn test_insufficient_data_is_recorded_not_promoted() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::failing(
        ReoptimizationError::InsufficientData {
            required: 201,
            available: 40,
        },
    ));
    let service = service(optimizer, records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.triggered);
    assert!(!outcome.promoted);
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::InsufficientData));
    assert!(records.get_active(&key()).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_optimizer_timeout_aborts_cycle() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(
        ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)])
            .with_delay(Duration::from_secs(600)),
    );
    let service = service(optimizer, records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert_eq!(outcome.rejection_reason, Some(RejectionReason::OptimizerTimeout));
    assert!(outcome.reason.contains("60s"));
    assert!(records.get_active(&key()).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_persist_retries_then_succeeds() {
    let records = Arc::new(FlakyRecords::new(2));
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let service = service(optimizer, records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(outcome.promoted);
    assert_eq!(records.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_persist_exhaustion_keeps_prior_record() {
    let records = Arc::new(FlakyRecords::new(10));
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let service = service(optimizer, records.clone(), default_policies());
    let (_tx, rx) = running();

    let outcome = service.run_cycle(&key(), false, &rx).await;

    assert!(!outcome.promoted);
    assert!(outcome.candidate_considered);
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::PersistenceFailure));
    assert!(outcome.reason.contains("after 3 attempts"));
    assert_eq!(records.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert!(records.get_active(&key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_shutdown_before_cycle_is_cancelled() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let service = service(optimizer.clone(), records, default_policies());
    let (tx, rx) = running();
    tx.send(true).unwrap();

    let outcome = service.run_cycle(&key(), true, &rx).await;

    assert_eq!(outcome.rejection_reason, Some(RejectionReason::Cancelled));
    assert_eq!(optimizer.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_optimizer_writes_nothing() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(
        ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)])
            .with_delay(Duration::from_secs(30)),
    );
    let service = Arc::new(service(optimizer.clone(), records.clone(), default_policies()));
    let (tx, rx) = running();

    let task = {
        let service = service.clone();
        tokio::spawn(async move { service.run_cycle(&key(), false, &rx).await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    tx.send(true).unwrap();

    let outcome = task.await.unwrap();
    assert_eq!(outcome.rejection_reason, Some(RejectionReason::Cancelled));
    assert_eq!(optimizer.calls(), 1);
    assert!(records.get_active(&key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_metrics_follow_outcomes() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -1.0)]));
    let metrics = Metrics::new().unwrap();
    let service = service(optimizer, records, default_policies()).with_metrics(metrics.clone());
    let (_tx, rx) = running();

    service.run_cycle(&key(), false, &rx).await;
    service.run_cycle(&key(), false, &rx).await;

    assert_eq!(metrics.cycles("promoted"), 1.0);
    assert_eq!(metrics.cycles("skipped"), 1.0);
    assert!(metrics.render().contains("reopt_active_version"));
}
