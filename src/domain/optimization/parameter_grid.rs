use super::parameter_set::ParameterValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunable axes searched by the grid optimizer. Missing keys in a TOML grid
/// file fall back to the default axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub rsi_period: Vec<usize>,
    pub sma_period: Vec<usize>,
    pub rsi_buy: Vec<f64>,
    pub rsi_sell: Vec<f64>,
    pub lookback_bars: Vec<usize>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            rsi_period: vec![10, 14, 21],
            sma_period: vec![15, 20, 30],
            rsi_buy: vec![30.0, 35.0, 40.0],
            rsi_sell: vec![60.0, 65.0, 70.0],
            lookback_bars: vec![8],
        }
    }
}

impl ParameterGrid {
    /// Every valid combination, in axis order. Pairs with `rsi_buy >= rsi_sell`
    /// and zero periods are skipped.
    pub fn combinations(&self) -> Vec<BTreeMap<String, ParameterValue>> {
        let mut combinations = Vec::new();

        for &rsi_period in &self.rsi_period {
            for &sma_period in &self.sma_period {
                if rsi_period == 0 || sma_period == 0 {
                    continue;
                }
                for &rsi_buy in &self.rsi_buy {
                    for &rsi_sell in &self.rsi_sell {
                        if rsi_buy >= rsi_sell {
                            continue;
                        }
                        for &lookback_bars in &self.lookback_bars {
                            let mut values = BTreeMap::new();
                            values.insert(
                                "rsi_period".to_string(),
                                ParameterValue::Int(rsi_period as i64),
                            );
                            values.insert(
                                "sma_period".to_string(),
                                ParameterValue::Int(sma_period as i64),
                            );
                            values.insert("rsi_buy".to_string(), ParameterValue::Float(rsi_buy));
                            values.insert("rsi_sell".to_string(), ParameterValue::Float(rsi_sell));
                            values.insert(
                                "lookback_bars".to_string(),
                                ParameterValue::Int(lookback_bars as i64),
                            );
                            combinations.push(values);
                        }
                    }
                }
            }
        }

        combinations
    }

    pub fn len(&self) -> usize {
        self.combinations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest indicator period on the grid.
    pub fn max_period(&self) -> usize {
        self.rsi_period
            .iter()
            .chain(self.sma_period.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}
