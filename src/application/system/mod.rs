use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub mod shutdown_service;

use crate::application::bootstrap::{
    persistence::{PersistenceBootstrap, PersistenceHandle},
    services::ServicesBootstrap,
};
use crate::application::optimization::{
    ReoptimizationScheduler, ReoptimizationService, SchedulerHandle, SchedulerSummary,
};
use crate::application::system::shutdown_service::ShutdownService;
use crate::config::Config;
use crate::domain::market::MarketKey;
use crate::infrastructure::observability::{Metrics, MetricsReporter};

/// Running daemon: one scheduler task per key plus the optional reporter.
pub struct SystemHandle {
    pub service: Arc<ReoptimizationService>,
    pub schedulers: Vec<SchedulerHandle>,
    pub metrics: Metrics,
    pub shutdown: Arc<ShutdownService>,
    tasks: Vec<(MarketKey, JoinHandle<SchedulerSummary>)>,
    reporter: Option<JoinHandle<()>>,
}

impl SystemHandle {
    /// Signals shutdown and waits for every scheduler to finish its cycle.
    pub async fn shutdown(self) -> Vec<(MarketKey, SchedulerSummary)> {
        self.shutdown.trigger();

        let mut summaries = Vec::with_capacity(self.tasks.len());
        for (key, task) in self.tasks {
            match task.await {
                Ok(summary) => summaries.push((key, summary)),
                Err(e) => error!("Scheduler task for {} ended abnormally: {}", key, e),
            }
        }
        if let Some(reporter) = self.reporter
            && let Err(e) = reporter.await
        {
            error!("Metrics reporter ended abnormally: {}", e);
        }

        info!("All schedulers stopped.");
        summaries
    }
}

pub struct Application {
    pub config: Config,
    pub persistence: PersistenceHandle,
    pub service: Arc<ReoptimizationService>,
    pub metrics: Metrics,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!(
            "Building Reoptimizer Application (Mode: {:?}, Storage: {:?})...",
            config.mode, config.storage.backend
        );

        let metrics = Metrics::new()?;
        let persistence = PersistenceBootstrap::init(&config.storage).await?;
        let market_data = ServicesBootstrap::market_data(&config);
        let service = ServicesBootstrap::reoptimization_service(
            &config,
            &persistence,
            market_data,
            Some(metrics.clone()),
        )?;

        Ok(Self {
            config,
            persistence,
            service,
            metrics,
        })
    }

    pub async fn start(self) -> Result<SystemHandle> {
        let shutdown = Arc::new(ShutdownService::new());
        let keys = self.config.market_keys();
        info!("Starting {} scheduler(s)...", keys.len());

        let mut schedulers = Vec::with_capacity(keys.len());
        let mut tasks = Vec::with_capacity(keys.len());
        for key in keys {
            let (scheduler, handle) = ReoptimizationScheduler::new(
                key.clone(),
                self.service.clone(),
                self.config.reoptimizer.cadence,
                self.config.reoptimizer.force,
                shutdown.subscribe(),
            );
            tasks.push((key, tokio::spawn(scheduler.run())));
            schedulers.push(handle);
        }

        let reporter = if self.config.observability.enabled {
            let reporter = MetricsReporter::new(
                self.persistence.active_records.clone(),
                self.metrics.clone(),
                self.config.observability.interval_secs,
            );
            Some(tokio::spawn(reporter.run(shutdown.subscribe())))
        } else {
            None
        };

        Ok(SystemHandle {
            service: self.service,
            schedulers,
            metrics: self.metrics,
            shutdown,
            tasks,
            reporter,
        })
    }
}
