use super::simulator::simulate;
use super::strategy::{RsiSmaParams, STRATEGY_NAME, TREND_EMA_PERIOD};
use crate::domain::errors::ReoptimizationError;
use crate::domain::market::{Candle, MarketKey};
use crate::domain::optimization::{Candidate, ParameterSet, ParameterValue, RankingMetric};
use crate::domain::ports::{MarketDataService, OptimizationReport, OptimizationRequest, Optimizer};
use async_trait::async_trait;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Exhaustive grid search over the RSI + SMA strategy.
///
/// Combinations are backtested in parallel on the rayon pool from inside
/// `spawn_blocking`; the result is sorted afterwards so evaluation order never
/// leaks into the output.
pub struct GridSearchOptimizer {
    market_data: Arc<dyn MarketDataService>,
}

impl GridSearchOptimizer {
    pub fn new(market_data: Arc<dyn MarketDataService>) -> Self {
        Self { market_data }
    }
}

#[async_trait]
impl Optimizer for GridSearchOptimizer {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationReport, ReoptimizationError> {
        let combinations = request.grid.combinations();
        if combinations.is_empty() {
            return Err(ReoptimizationError::Optimizer(
                "parameter grid has no valid combinations".to_string(),
            ));
        }

        let mut candles = self
            .market_data
            .get_candles(&request.key, request.window)
            .await
            .map_err(|e| ReoptimizationError::DataUnavailable {
                key: request.key.to_string(),
                reason: format!("{:#}", e),
            })?;

        if candles.len() > request.window {
            candles.drain(..candles.len() - request.window);
        }

        let required = request.grid.max_period().max(TREND_EMA_PERIOD) + 1;
        if candles.len() < required {
            return Err(ReoptimizationError::InsufficientData {
                required,
                available: candles.len(),
            });
        }

        let data_end = candles
            .last()
            .and_then(Candle::open_time)
            .ok_or_else(|| ReoptimizationError::Optimizer("last candle has no valid timestamp".to_string()))?;
        let candles_used = candles.len();

        info!(
            "GridSearchOptimizer: evaluating {} combinations for {} on {} candles",
            combinations.len(),
            request.key,
            candles_used
        );

        let key = request.key.clone();
        let ranking = request.ranking;
        let candidates = tokio::task::spawn_blocking(move || {
            evaluate_grid(&key, &candles, combinations, ranking)
        })
        .await
        .map_err(|e| ReoptimizationError::Optimizer(format!("grid evaluation task failed: {}", e)))??;

        if let Some(best) = candidates.first() {
            debug!(
                "GridSearchOptimizer: best {} -> return {:.2}% sharpe {:.2}",
                best.parameters.describe(),
                best.metrics.return_pct,
                best.metrics.sharpe
            );
        }

        Ok(OptimizationReport {
            candidates,
            data_end,
            candles_used,
        })
    }
}

/// Backtests every combination and returns them ranked best first.
pub fn evaluate_grid(
    key: &MarketKey,
    candles: &[Candle],
    combinations: Vec<BTreeMap<String, ParameterValue>>,
    ranking: RankingMetric,
) -> Result<Vec<Candidate>, ReoptimizationError> {
    let mut candidates = combinations
        .into_par_iter()
        .map(|values| {
            let params = RsiSmaParams::from_values(&values)?;
            let metrics = simulate(candles, &params)?;
            Ok(Candidate::new(
                ParameterSet::draft(key.clone(), STRATEGY_NAME, values),
                metrics,
            ))
        })
        .collect::<Result<Vec<_>, ReoptimizationError>>()?;

    ranking.rank(&mut candidates);
    Ok(candidates)
}
