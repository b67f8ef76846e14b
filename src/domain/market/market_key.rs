use super::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses one independent reoptimization loop and its ActiveRecord.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl MarketKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            timeframe,
        }
    }

    /// File-name friendly form, e.g. `BTCUSDC_15m`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.symbol, self.timeframe)
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.timeframe)
    }
}
