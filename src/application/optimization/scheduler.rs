use super::reoptimization_service::{ReoptimizationService, wait_for_shutdown};
use crate::domain::market::MarketKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Requests an immediate forced cycle. Requests made while one is already
/// queued collapse into it.
#[derive(Clone)]
pub struct SchedulerHandle {
    key: MarketKey,
    trigger_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    pub fn key(&self) -> &MarketKey {
        &self.key
    }

    /// Returns false when a trigger is already pending or the loop has exited.
    pub fn trigger_now(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub promotions: u64,
}

/// Fixed-cadence loop driving one market key.
///
/// Ticks that fall due while a cycle is still running are dropped: the
/// interval still hands back one overdue tick after a slow cycle, and that
/// tick is discarded so the next cycle waits for the next cadence boundary.
pub struct ReoptimizationScheduler {
    key: MarketKey,
    service: Arc<ReoptimizationService>,
    cadence: Duration,
    force_first: bool,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ReoptimizationScheduler {
    pub fn new(
        key: MarketKey,
        service: Arc<ReoptimizationService>,
        cadence: Duration,
        force_first: bool,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, SchedulerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let handle = SchedulerHandle {
            key: key.clone(),
            trigger_tx,
        };
        (
            Self {
                key,
                service,
                cadence,
                force_first,
                trigger_rx,
                shutdown_rx,
            },
            handle,
        )
    }

    pub async fn run(mut self) -> SchedulerSummary {
        info!(
            "ReoptimizationScheduler: starting for {} (cadence: {:?}, force first: {})",
            self.key, self.cadence, self.force_first
        );

        let mut ticker = time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = SchedulerSummary::default();
        let mut force = self.force_first;
        let mut last_cycle_end: Option<Instant> = None;

        loop {
            let tick_deadline = tokio::select! {
                biased;
                _ = wait_for_shutdown(self.shutdown_rx.clone()) => break,
                Some(()) = self.trigger_rx.recv() => None,
                deadline = ticker.tick() => Some(deadline),
            };
            let triggered = tick_deadline.is_none();

            if let (Some(deadline), Some(ended)) = (tick_deadline, last_cycle_end)
                && deadline < ended
            {
                debug!(
                    "ReoptimizationScheduler: dropping tick for {} that fell due during the previous cycle",
                    self.key
                );
                continue;
            }

            if triggered {
                debug!("ReoptimizationScheduler: manual trigger for {}", self.key);
            }

            let outcome = self
                .service
                .run_cycle(&self.key, force || triggered, &self.shutdown_rx)
                .await;
            force = false;
            last_cycle_end = Some(Instant::now());

            summary.cycles += 1;
            if outcome.promoted {
                summary.promotions += 1;
            }
        }

        info!(
            "ReoptimizationScheduler: {} stopped after {} cycles ({} promotions)",
            self.key, summary.cycles, summary.promotions
        );
        summary
    }
}
