//! Long-only RSI + SMA strategy with trend filter.
//!
//! Entry needs an uptrend (close at or above EMA200 and above the SMA) and
//! either a fresh RSI cross above `rsi_buy` or a recovery: RSI dipped below
//! `rsi_buy` within the last `lookback_bars` bars and is rising again.
//! Exit on RSI above `rsi_sell`, a close 0.5% under the SMA, or a -2% bar
//! while holding.

use crate::domain::errors::ReoptimizationError;
use crate::domain::optimization::ParameterValue;
use std::collections::{BTreeMap, VecDeque};
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};

pub const STRATEGY_NAME: &str = "rsi_sma";
pub const TREND_EMA_PERIOD: usize = 200;

const SMA_EXIT_BUFFER: f64 = 0.995;
const STOP_BAR_RATIO: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiSmaParams {
    pub rsi_period: usize,
    pub sma_period: usize,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub lookback_bars: usize,
}

impl RsiSmaParams {
    pub fn from_values(values: &BTreeMap<String, ParameterValue>) -> Result<Self, ReoptimizationError> {
        let int = |name: &str| -> Result<usize, ReoptimizationError> {
            values
                .get(name)
                .and_then(ParameterValue::as_i64)
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .ok_or_else(|| ReoptimizationError::Optimizer(format!("missing or invalid {}", name)))
        };
        let float = |name: &str| -> Result<f64, ReoptimizationError> {
            values
                .get(name)
                .and_then(ParameterValue::as_f64)
                .ok_or_else(|| ReoptimizationError::Optimizer(format!("missing or invalid {}", name)))
        };

        Ok(Self {
            rsi_period: int("rsi_period")?,
            sma_period: int("sma_period")?,
            rsi_buy: float("rsi_buy")?,
            rsi_sell: float("rsi_sell")?,
            lookback_bars: int("lookback_bars")?,
        })
    }

    /// Candles needed before every indicator has a value, plus one bar to trade on.
    pub fn required_candles(&self) -> usize {
        self.rsi_period.max(self.sma_period).max(TREND_EMA_PERIOD) + 1
    }
}

pub struct RsiSmaStrategy {
    params: RsiSmaParams,
    rsi: RelativeStrengthIndex,
    sma: SimpleMovingAverage,
    ema: ExponentialMovingAverage,
    bars_seen: usize,
    prev_rsi: Option<f64>,
    prev_close: Option<f64>,
    recent_rsi: VecDeque<f64>,
}

impl RsiSmaStrategy {
    pub fn new(params: RsiSmaParams) -> Result<Self, ReoptimizationError> {
        let indicator_err = |e: ta::errors::TaError| ReoptimizationError::Optimizer(format!("{:?}", e));

        Ok(Self {
            rsi: RelativeStrengthIndex::new(params.rsi_period).map_err(indicator_err)?,
            sma: SimpleMovingAverage::new(params.sma_period).map_err(indicator_err)?,
            ema: ExponentialMovingAverage::new(TREND_EMA_PERIOD).map_err(indicator_err)?,
            bars_seen: 0,
            prev_rsi: None,
            prev_close: None,
            recent_rsi: VecDeque::with_capacity(params.lookback_bars),
            params,
        })
    }

    /// Feeds one close and returns the signal for that bar.
    pub fn next(&mut self, close: f64, in_position: bool) -> Signal {
        let rsi_value = self.rsi.next(close);
        let sma_value = self.sma.next(close);
        let ema_value = self.ema.next(close);
        self.bars_seen += 1;

        // RSI needs `rsi_period` price changes, i.e. one bar more than its period.
        let rsi = (self.bars_seen > self.params.rsi_period).then_some(rsi_value);
        let sma = (self.bars_seen >= self.params.sma_period).then_some(sma_value);
        let ema = (self.bars_seen >= TREND_EMA_PERIOD).then_some(ema_value);

        if let Some(value) = rsi {
            if self.recent_rsi.len() == self.params.lookback_bars {
                self.recent_rsi.pop_front();
            }
            self.recent_rsi.push_back(value);
        }

        let signal = self.evaluate(close, rsi, sma, ema, in_position);

        self.prev_rsi = rsi;
        self.prev_close = Some(close);
        signal
    }

    fn evaluate(
        &self,
        close: f64,
        rsi: Option<f64>,
        sma: Option<f64>,
        ema: Option<f64>,
        in_position: bool,
    ) -> Signal {
        let p = &self.params;

        if let (Some(rsi), Some(sma), Some(ema)) = (rsi, sma, ema) {
            let uptrend = close >= ema && close > sma;
            let crossed_up = self.prev_rsi.is_some_and(|prev| prev < p.rsi_buy) && rsi >= p.rsi_buy;
            let rising = self.prev_rsi.is_some_and(|prev| rsi > prev);
            let recent_oversold = self.recent_rsi.iter().any(|v| *v < p.rsi_buy);
            let recovery = recent_oversold && rsi >= p.rsi_buy && rising;

            if uptrend && (crossed_up || recovery) {
                return Signal::Buy;
            }
        }

        let overbought = rsi.is_some_and(|v| v > p.rsi_sell);
        let lost_sma = sma.is_some_and(|v| close < v * SMA_EXIT_BUFFER);
        let stop_bar = in_position && self.prev_close.is_some_and(|prev| close < prev * STOP_BAR_RATIO);

        if overbought || lost_sma || stop_bar {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
