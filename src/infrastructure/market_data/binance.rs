//! Binance klines client.
//!
//! Fetches the most recent `limit` closed candles for a key from
//! `/api/v3/klines`. Binance caps one response at 1000 rows, so longer
//! windows are paged backwards with `endTime`.

use crate::domain::market::{Candle, MarketKey};
use crate::domain::ports::MarketDataService;
use crate::infrastructure::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, info};

const KLINES_PATH: &str = "/api/v3/klines";
const MAX_PAGE: usize = 1000;

pub struct BinanceMarketDataService {
    client: ClientWithMiddleware,
    base_url: String,
}

impl BinanceMarketDataService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_page(
        &self,
        key: &MarketKey,
        limit: usize,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let limit_str = limit.to_string();
        let mut params = vec![
            ("symbol", key.symbol.clone()),
            ("interval", key.timeframe.as_str().to_string()),
            ("limit", limit_str),
        ];
        if let Some(end) = end_time {
            params.push(("endTime", end.to_string()));
        }

        let url = build_url_with_query(&self.base_url, KLINES_PATH, &params)?;
        debug!("BinanceMarketDataService: GET {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .context("Failed to fetch klines from Binance")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance klines fetch failed: {}", error_text);
        }

        let klines: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Failed to parse Binance klines response")?;

        Ok(parse_klines(&klines))
    }
}

/// Binance klines format: `[open_time, open, high, low, close, volume, ...]`
/// with prices as strings. Malformed rows are dropped.
pub fn parse_klines(klines: &[serde_json::Value]) -> Vec<Candle> {
    klines
        .iter()
        .filter_map(|k| {
            let arr = k.as_array()?;
            if arr.len() < 6 {
                return None;
            }

            let field = |i: usize| -> Option<f64> {
                match &arr[i] {
                    serde_json::Value::String(s) => s.parse::<f64>().ok(),
                    v => v.as_f64(),
                }
            };

            Some(Candle {
                timestamp: arr[0].as_i64()?,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            })
        })
        .collect()
}

#[async_trait]
impl MarketDataService for BinanceMarketDataService {
    async fn get_candles(&self, key: &MarketKey, limit: usize) -> Result<Vec<Candle>> {
        let mut collected: Vec<Candle> = Vec::with_capacity(limit);
        let mut end_time: Option<i64> = None;

        while collected.len() < limit {
            let page_size = (limit - collected.len()).min(MAX_PAGE);
            let mut page = self.fetch_page(key, page_size, end_time).await?;
            if page.is_empty() {
                break;
            }

            let short_page = page.len() < page_size;
            end_time = Some(page[0].timestamp - 1);
            page.append(&mut collected);
            collected = page;

            if short_page {
                break;
            }
        }

        collected.sort_by_key(|c| c.timestamp);
        collected.dedup_by_key(|c| c.timestamp);

        // The newest kline is still forming until its interval ends
        let step_ms = key.timeframe.to_seconds() * 1000;
        let now_ms = Utc::now().timestamp_millis();
        collected.retain(|c| c.timestamp + step_ms <= now_ms);

        if collected.len() > limit {
            collected.drain(..collected.len() - limit);
        }

        info!(
            "BinanceMarketDataService: Fetched {} bars for {}",
            collected.len(),
            key
        );
        Ok(collected)
    }
}
