//! Reoptimization CLI
//!
//! One-shot access to the reoptimization cycle: run a single cycle for a key,
//! print the active record, list run history, or inspect the parameter grid.
//! Storage and thresholds come from the same environment as the daemon.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reoptimizer::application::system::Application;
use reoptimizer::application::system::shutdown_service::ShutdownService;
use reoptimizer::config::{Config, LogFormat, load_grid_from_toml};
use reoptimizer::domain::market::{MarketKey, Timeframe};
use reoptimizer::domain::optimization::ParameterGrid;
use reoptimizer::infrastructure::observability::init_tracing;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Strategy Reoptimization CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reoptimization cycle for a single key
    Run {
        /// Symbol to optimize
        #[arg(short, long, default_value = "BTCUSDC")]
        symbol: String,

        /// Candle timeframe (1m, 5m, 15m, 30m, 1h, 4h, 1d)
        #[arg(short, long, default_value = "15m")]
        timeframe: String,

        /// Ignore the staleness check
        #[arg(short, long)]
        force: bool,

        /// TOML file with parameter grid configuration
        #[arg(long)]
        grid_config: Option<String>,
    },
    /// Print the active record for a key
    Show {
        #[arg(short, long, default_value = "BTCUSDC")]
        symbol: String,

        #[arg(short, long, default_value = "15m")]
        timeframe: String,
    },
    /// List recent optimization runs for a key
    History {
        #[arg(short, long, default_value = "BTCUSDC")]
        symbol: String,

        #[arg(short, long, default_value = "15m")]
        timeframe: String,

        /// Number of runs to display
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Print the parameter grid combinations
    Grid {
        /// TOML file with parameter grid configuration
        #[arg(long)]
        grid_config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::Pretty);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            symbol,
            timeframe,
            force,
            grid_config,
        } => {
            let key = parse_key(&symbol, &timeframe)?;
            let mut config = Config::from_env()?;
            if let Some(path) = grid_config {
                config.reoptimizer.grid_file = Some(path.into());
            }

            let app = Application::build(config).await?;
            let shutdown = Arc::new(ShutdownService::new());
            let ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.trigger();
                }
            });

            println!("{}", "=".repeat(80));
            println!("REOPTIMIZATION CYCLE: {} (force: {})", key, force);
            println!("{}\n", "=".repeat(80));

            let outcome = app.service.run_cycle(&key, force, &shutdown.subscribe()).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if outcome.promoted
                && let Some(active) = app.service.get_active(&key).await?
            {
                println!("\nPromoted v{}: {}", active.version(), active.parameters.describe());
            }
        }
        Commands::Show { symbol, timeframe } => {
            let key = parse_key(&symbol, &timeframe)?;
            let app = Application::build(Config::from_env()?).await?;
            match app.service.get_active(&key).await? {
                Some(active) => println!("{}", serde_json::to_string_pretty(active.as_ref())?),
                None => println!("No active record for {}", key),
            }
        }
        Commands::History {
            symbol,
            timeframe,
            limit,
        } => {
            let key = parse_key(&symbol, &timeframe)?;
            let app = Application::build(Config::from_env()?).await?;
            let runs = &app.persistence.runs;

            println!(
                "{:<25} {:>6} {:>10} {:>8} {:>9} {:>8}  PARAMETERS",
                "RAN AT", "EVAL", "RETURN%", "SHARPE", "MAX DD%", "PROMOTED"
            );
            for run in runs.find_by_key(&key, limit).await? {
                println!(
                    "{:<25} {:>6} {:>10.2} {:>8.2} {:>9.2} {:>8}  {}",
                    run.ran_at.format("%Y-%m-%d %H:%M:%S"),
                    run.evaluated,
                    run.best.metrics.return_pct,
                    run.best.metrics.sharpe,
                    run.best.metrics.max_drawdown_pct,
                    run.promoted_version
                        .map(|v| format!("v{}", v))
                        .unwrap_or_else(|| "-".to_string()),
                    run.best.parameters.describe()
                );
            }
        }
        Commands::Grid { grid_config } => {
            let grid = if let Some(config_file) = grid_config {
                info!("Loading parameter grid from: {}", config_file);
                load_grid_from_toml(&config_file)?
            } else {
                info!("Using default parameter grid");
                ParameterGrid::default()
            };

            let combinations = grid.combinations();
            println!("{} combinations", combinations.len());
            for values in combinations {
                let line: Vec<String> = values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!("  {}", line.join(", "));
            }
        }
    }

    Ok(())
}

fn parse_key(symbol: &str, timeframe: &str) -> Result<MarketKey> {
    let timeframe: Timeframe = timeframe.parse()?;
    Ok(MarketKey::new(symbol, timeframe))
}
