use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool with the reoptimizer schema applied.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal); // Readers never block on the writer

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Private in-memory database. One connection, since every new
    /// `:memory:` connection would see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Active records: one row per key, whole record serialized in record_json
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_records (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                version INTEGER NOT NULL,
                record_json TEXT NOT NULL,
                data_end INTEGER NOT NULL,
                last_evaluated_at INTEGER NOT NULL,
                written_at INTEGER NOT NULL,
                PRIMARY KEY (symbol, timeframe)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create active_records table")?;

        // 2. Cycle leases (timestamps in milliseconds)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycle_leases (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                holder TEXT NOT NULL,
                acquired_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (symbol, timeframe)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create cycle_leases table")?;

        // 3. Optimization run history
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimization_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                ran_at INTEGER NOT NULL,
                data_end INTEGER NOT NULL,
                evaluated INTEGER NOT NULL,
                best_json TEXT NOT NULL,
                return_pct REAL NOT NULL,
                sharpe REAL NOT NULL,
                max_drawdown_pct REAL NOT NULL,
                promoted_version INTEGER,
                settled INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create optimization_runs table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_opt_runs_key_time
            ON optimization_runs (symbol, timeframe, ran_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create optimization_runs index")?;

        info!("Database schema initialized");
        Ok(())
    }
}
