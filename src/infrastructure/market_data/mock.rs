use crate::domain::market::{Candle, MarketKey};
use crate::domain::ports::MarketDataService;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const START_PRICE: f64 = 100.0;
const BAR_VOLATILITY: f64 = 0.01;

/// Random-walk candle source for mock mode and tests.
///
/// The price path depends only on the seed and the key, so two calls with the
/// same arguments return the same closes. The window ends on the last closed
/// bar before `end` (or now).
pub struct MockMarketDataService {
    seed: u64,
    end: Option<DateTime<Utc>>,
}

impl MockMarketDataService {
    pub fn new(seed: u64) -> Self {
        Self { seed, end: None }
    }

    /// Pins the end of generated windows instead of following the wall clock.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    fn key_seed(&self, key: &MarketKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        hasher.finish()
    }

    pub fn generate(&self, key: &MarketKey, limit: usize) -> Vec<Candle> {
        let step_ms = key.timeframe.to_seconds() * 1000;
        let end_ms = self.end.unwrap_or_else(Utc::now).timestamp_millis();
        let last_open = (end_ms / step_ms) * step_ms - step_ms;
        let first_open = last_open - step_ms * (limit as i64 - 1);

        let mut rng = StdRng::seed_from_u64(self.key_seed(key));
        let mut price = START_PRICE;
        let mut candles = Vec::with_capacity(limit);

        for i in 0..limit {
            let open = price;
            let change = gaussian(&mut rng) * BAR_VOLATILITY;
            let close = (open * (1.0 + change)).max(0.01);
            let wick = rng.random_range(0.0..BAR_VOLATILITY / 2.0);

            candles.push(Candle {
                timestamp: first_open + step_ms * i as i64,
                open,
                high: open.max(close) * (1.0 + wick),
                low: open.min(close) * (1.0 - wick),
                close,
                volume: rng.random_range(10.0..1000.0),
            });
            price = close;
        }
        candles
    }
}

impl Default for MockMarketDataService {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn get_candles(&self, key: &MarketKey, limit: usize) -> Result<Vec<Candle>> {
        Ok(self.generate(key, limit))
    }
}
