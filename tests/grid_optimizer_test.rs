mod common;

use chrono::{TimeZone, Utc};
use common::*;
use reoptimizer::application::optimization::{GridSearchOptimizer, ReoptimizationSettings};
use reoptimizer::domain::errors::ReoptimizationError;
use reoptimizer::domain::optimization::{
    Acceptance, ImprovementThresholds, ParameterGrid, QualityThresholds, RankingMetric,
    RejectionReason, TriggerReason,
};
use reoptimizer::domain::ports::{OptimizationRequest, Optimizer};
use reoptimizer::domain::repositories::ActiveRecordRepository;
use reoptimizer::infrastructure::market_data::MockMarketDataService;
use reoptimizer::infrastructure::repositories::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
    InMemoryOptimizationRunRepository,
};
use std::sync::Arc;
use tokio::sync::watch;

fn pinned_source() -> Arc<MockMarketDataService> {
    let end = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
    Arc::new(MockMarketDataService::new(11).with_end(end))
}

fn request(window: usize, ranking: RankingMetric) -> OptimizationRequest {
    OptimizationRequest {
        key: key(),
        window,
        grid: ParameterGrid::default(),
        ranking,
    }
}

#[tokio::test]
async fn test_ranking_is_reproducible_across_runs() {
    let optimizer = GridSearchOptimizer::new(pinned_source());

    let a = optimizer.optimize(&request(600, RankingMetric::Sharpe)).await.unwrap();
    let b = optimizer.optimize(&request(600, RankingMetric::Sharpe)).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.candles_used, 600);
    assert_eq!(a.candidates.len(), ParameterGrid::default().len());
    for pair in a.candidates.windows(2) {
        assert!(pair[0].metrics.sharpe >= pair[1].metrics.sharpe);
    }
    // Newest candle opened at 09:15, the bar in progress at 09:30 is excluded
    assert_eq!(a.data_end, Utc.with_ymd_and_hms(2025, 6, 2, 9, 15, 0).unwrap());
}

#[tokio::test]
async fn test_short_window_is_insufficient() {
    let optimizer = GridSearchOptimizer::new(pinned_source());

    let err = optimizer.optimize(&request(100, RankingMetric::ReturnPct)).await.unwrap_err();

    assert!(matches!(
        err,
        ReoptimizationError::InsufficientData { available: 100, .. }
    ));
}

#[tokio::test]
async fn test_full_cycle_over_mock_data() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let runs = Arc::new(InMemoryOptimizationRunRepository::new());
    let settings = ReoptimizationSettings {
        window: 600,
        ..settings()
    };
    let policies = policies(
        60,
        QualityThresholds {
            allow_fallback: true,
            ..QualityThresholds::default()
        },
        ImprovementThresholds::default(),
    );
    let service = service_with(
        Arc::new(GridSearchOptimizer::new(pinned_source())),
        records.clone(),
        Arc::new(InMemoryCycleLeaseRepository::new()),
        Some(runs.clone()),
        settings,
        policies,
    );
    let (_tx, rx) = watch::channel(false);

    let first = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(first.trigger, Some(TriggerReason::ColdStart));
    assert!(first.promoted);
    assert!(matches!(
        first.acceptance,
        Some(Acceptance::Passed) | Some(Acceptance::FallbackAccepted)
    ));

    let active = records.get_active(&key()).await.unwrap().unwrap();
    assert_eq!(active.version(), 1);
    assert_eq!(active.parameters.strategy(), "rsi_sma");
    assert_eq!(active.data_end, Utc.with_ymd_and_hms(2025, 6, 2, 9, 15, 0).unwrap());

    // The pinned window is long past the stale threshold, so the next cycle
    // runs again, finds the same winner and declines to promote it
    let second = service.run_cycle(&key(), false, &rx).await;
    assert_eq!(second.trigger, Some(TriggerReason::StaleData));
    assert!(!second.promoted);
    assert_eq!(second.rejection_reason, Some(RejectionReason::NotBetter));
    assert_eq!(records.get_active(&key()).await.unwrap().unwrap().version(), 1);
    assert_eq!(runs.count().await, 2);
}
