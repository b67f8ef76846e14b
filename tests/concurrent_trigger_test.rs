mod common;

use common::*;
use reoptimizer::domain::optimization::RejectionReason;
use reoptimizer::domain::repositories::ActiveRecordRepository;
use reoptimizer::infrastructure::persistence::Database;
use reoptimizer::infrastructure::persistence::repositories::{
    SqliteActiveRecordRepository, SqliteCycleLeaseRepository,
};
use reoptimizer::infrastructure::repositories::{
    InMemoryActiveRecordRepository, InMemoryCycleLeaseRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_simultaneous_triggers_run_one_optimizer() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(
        ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -2.0)])
            .with_delay(Duration::from_millis(200)),
    );
    let service = service(optimizer.clone(), records.clone(), default_policies());
    let (_tx, rx) = watch::channel(false);

    let (k1, k2) = (key(), key());
    let (a, b) = tokio::join!(
        service.run_cycle(&k1, true, &rx),
        service.run_cycle(&k2, true, &rx)
    );

    assert_eq!(optimizer.calls(), 1);
    let held = [&a, &b]
        .iter()
        .filter(|o| o.rejection_reason == Some(RejectionReason::LeaseHeld))
        .count();
    assert_eq!(held, 1);
    assert_eq!([&a, &b].iter().filter(|o| o.promoted).count(), 1);
    assert_eq!(records.get_active(&key()).await.unwrap().unwrap().version(), 1);
}

#[tokio::test]
async fn test_lease_is_released_after_cycle() {
    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -2.0)]));
    let service = service(optimizer.clone(), records, default_policies());
    let (_tx, rx) = watch::channel(false);

    let first = service.run_cycle(&key(), true, &rx).await;
    let second = service.run_cycle(&key(), true, &rx).await;

    assert_eq!(first.promoted_version, Some(1));
    assert_ne!(second.rejection_reason, Some(RejectionReason::LeaseHeld));
    assert_eq!(optimizer.calls(), 2);
}

#[tokio::test]
async fn test_two_services_share_sqlite_lease() {
    let db = Database::in_memory().await.unwrap();
    let records: Arc<dyn ActiveRecordRepository> =
        Arc::new(SqliteActiveRecordRepository::new(db.pool.clone()));

    let slow = Arc::new(
        ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -2.0)])
            .with_delay(Duration::from_millis(300)),
    );
    let fast = Arc::new(ScriptedOptimizer::returning(vec![candidate(2, 9.0, 2.0, -2.0)]));

    let first = service_with(
        slow.clone(),
        records.clone(),
        Arc::new(SqliteCycleLeaseRepository::new(db.pool.clone())),
        None,
        settings(),
        default_policies(),
    );
    let second = service_with(
        fast.clone(),
        records.clone(),
        Arc::new(SqliteCycleLeaseRepository::new(db.pool.clone())),
        None,
        settings(),
        default_policies(),
    );
    let (_tx, rx) = watch::channel(false);

    let (k1, k2) = (key(), key());
    let (a, b) = tokio::join!(first.run_cycle(&k1, true, &rx), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        second.run_cycle(&k2, true, &rx).await
    });

    assert!(a.promoted);
    assert_eq!(b.rejection_reason, Some(RejectionReason::LeaseHeld));
    assert_eq!(slow.calls(), 1);
    assert_eq!(fast.calls(), 0);

    let active = records.get_active(&key()).await.unwrap().unwrap();
    assert_eq!(tag_of(&active.parameters), 1);
}

#[tokio::test]
async fn test_different_keys_do_not_block_each_other() {
    use reoptimizer::domain::market::{MarketKey, Timeframe};

    let records = Arc::new(InMemoryActiveRecordRepository::new());
    let optimizer = Arc::new(
        ScriptedOptimizer::returning(vec![candidate(1, 5.0, 1.0, -2.0)])
            .with_delay(Duration::from_millis(100)),
    );
    let service = service_with(
        optimizer.clone(),
        records,
        Arc::new(InMemoryCycleLeaseRepository::new()),
        None,
        settings(),
        default_policies(),
    );
    let (_tx, rx) = watch::channel(false);
    let other = MarketKey::new("ETHUSDT", Timeframe::OneHour);

    let k1 = key();
    let (a, b) = tokio::join!(
        service.run_cycle(&k1, true, &rx),
        service.run_cycle(&other, true, &rx)
    );

    assert_eq!(optimizer.calls(), 2);
    assert_ne!(a.rejection_reason, Some(RejectionReason::LeaseHeld));
    assert_ne!(b.rejection_reason, Some(RejectionReason::LeaseHeld));
}
