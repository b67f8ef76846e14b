use crate::domain::market::MarketKey;
use crate::domain::optimization::Candidate;
use crate::domain::ports::CandidateExporter;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CandidateRow {
    rank: usize,
    strategy: String,
    parameters: String,
    return_pct: f64,
    sharpe: f64,
    max_drawdown_pct: f64,
    sample_size: u64,
}

/// Writes the ranked candidates of the latest run to
/// `<dir>/candidates_<SYMBOL>_<TF>.csv`, replacing the previous file.
pub struct CsvCandidateExporter {
    dir: PathBuf,
}

impl CsvCandidateExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &MarketKey) -> PathBuf {
        self.dir
            .join(format!("candidates_{}.csv", key.storage_key()))
    }
}

impl CandidateExporter for CsvCandidateExporter {
    fn export(&self, key: &MarketKey, candidates: &[Candidate]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create export directory {:?}", self.dir))?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("csv.tmp");
        {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(true)
                .from_path(&temp_path)
                .context("Failed to open candidate export file")?;

            for (i, candidate) in candidates.iter().enumerate() {
                wtr.serialize(CandidateRow {
                    rank: i + 1,
                    strategy: candidate.parameters.strategy().to_string(),
                    parameters: candidate.parameters.describe(),
                    return_pct: candidate.metrics.return_pct,
                    sharpe: candidate.metrics.sharpe,
                    max_drawdown_pct: candidate.metrics.max_drawdown_pct,
                    sample_size: candidate.metrics.sample_size,
                })
                .context("Failed to serialize candidate row")?;
            }
            wtr.flush().context("Failed to flush CSV writer")?;
        }
        fs::rename(&temp_path, &path).context("Failed to rename candidate export")?;

        debug!("Exported {} candidates to {:?}", candidates.len(), path);
        Ok(())
    }
}
