//! Reoptimizer daemon - headless strategy reoptimization loop
//!
//! Runs one scheduler per configured (symbol, timeframe) key. Each scheduler
//! periodically re-optimizes the strategy parameters and promotes a better
//! set into the active record the live trader reads.
//!
//! # Usage
//! ```sh
//! REOPT_SYMBOLS=BTCUSDC,ETHUSDC REOPT_TIMEFRAMES=15m cargo run --bin reoptimizer
//! ```
//!
//! # Environment Variables
//! - `MODE` - `mock` or `binance` (default: mock)
//! - `STORAGE_BACKEND` - `sqlite`, `json` or `memory` (default: sqlite)
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: false)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)

use anyhow::Result;
use reoptimizer::application::system::Application;
use reoptimizer::config::{Config, LogFormat};
use reoptimizer::infrastructure::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // A malformed LOG_FORMAT is reported by Config::from_env below
    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_tracing(log_format);

    info!("Reoptimizer {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: Mode={:?}, Symbols={:?}, Timeframes={:?}, Storage={:?}",
        config.mode, config.symbols, config.timeframes, config.storage.backend
    );

    let app = Application::build(config).await?;
    let handle = app.start().await?;
    info!("Reoptimizer running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Waiting for running cycles...");

    for (key, summary) in handle.shutdown().await {
        info!(
            "{}: {} cycles, {} promotions",
            key, summary.cycles, summary.promotions
        );
    }

    info!("Exiting.");
    Ok(())
}
