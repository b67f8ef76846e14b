use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::application::bootstrap::persistence::PersistenceHandle;
use crate::application::optimization::{
    CyclePolicies, GridSearchOptimizer, ReoptimizationPorts, ReoptimizationService,
    ReoptimizationSettings,
};
use crate::config::{Config, Mode};
use crate::domain::optimization::{CandleDataGate, PromotionPolicy, QualityGate};
use crate::domain::ports::{CandidateExporter, MarketDataService};
use crate::infrastructure::candidate_export::CsvCandidateExporter;
use crate::infrastructure::freshness::ActiveSnapshotFreshness;
use crate::infrastructure::market_data::{BinanceMarketDataService, MockMarketDataService};
use crate::infrastructure::observability::Metrics;

pub struct ServicesBootstrap;

impl ServicesBootstrap {
    pub fn market_data(config: &Config) -> Arc<dyn MarketDataService> {
        match config.mode {
            Mode::Binance => {
                info!("Candles from Binance at {}", config.binance_base_url);
                Arc::new(BinanceMarketDataService::new(config.binance_base_url.clone()))
            }
            Mode::Mock => {
                info!("Candles from the mock random-walk source");
                Arc::new(MockMarketDataService::default())
            }
        }
    }

    /// Wires the cycle service from configuration and the storage handle.
    pub fn reoptimization_service(
        config: &Config,
        persistence: &PersistenceHandle,
        market_data: Arc<dyn MarketDataService>,
        metrics: Option<Metrics>,
    ) -> Result<Arc<ReoptimizationService>> {
        let reopt = &config.reoptimizer;
        let settings = ReoptimizationSettings {
            window: reopt.window,
            grid: reopt.load_grid()?,
            ranking: reopt.ranking,
            optimizer_timeout: reopt.optimizer_timeout,
            lease_ttl: reopt.lease_ttl,
            persist_max_attempts: reopt.persist_max_attempts,
            persist_base_delay_ms: reopt.persist_base_delay_ms,
        };

        let stale_threshold = chrono::Duration::from_std(reopt.stale_threshold)?;
        let policies = CyclePolicies {
            staleness: CandleDataGate::new(stale_threshold),
            quality: QualityGate::new(config.gate.quality),
            promotion: PromotionPolicy::new(config.gate.improvement),
        };

        let exporter = config
            .storage
            .candidates_csv_dir
            .as_ref()
            .map(|dir| Arc::new(CsvCandidateExporter::new(dir)) as Arc<dyn CandidateExporter>);

        let ports = ReoptimizationPorts {
            optimizer: Arc::new(GridSearchOptimizer::new(market_data)),
            freshness: Arc::new(
                ActiveSnapshotFreshness::new(persistence.active_records.clone())
                    .with_runs(persistence.runs.clone()),
            ),
            active_records: persistence.active_records.clone(),
            leases: persistence.leases.clone(),
            runs: Some(persistence.runs.clone()),
            exporter,
        };

        let mut service = ReoptimizationService::new(settings, policies, ports);
        if let Some(metrics) = metrics {
            service = service.with_metrics(metrics);
        }
        Ok(Arc::new(service))
    }
}
