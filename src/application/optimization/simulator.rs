use super::strategy::{RsiSmaParams, RsiSmaStrategy, Signal};
use crate::domain::errors::ReoptimizationError;
use crate::domain::market::Candle;
use crate::domain::optimization::BacktestMetrics;
use statrs::statistics::Statistics;

pub const INITIAL_CAPITAL: f64 = 10_000.0;
const ANNUALIZATION_PERIODS: f64 = 252.0;

/// Single-position backtest. Equity moves only when a trade closes; an open
/// position at the end of the window is left unrealized.
pub fn simulate(candles: &[Candle], params: &RsiSmaParams) -> Result<BacktestMetrics, ReoptimizationError> {
    let required = params.required_candles();
    if candles.len() < required {
        return Err(ReoptimizationError::InsufficientData {
            required,
            available: candles.len(),
        });
    }

    let mut strategy = RsiSmaStrategy::new(*params)?;
    let mut capital = INITIAL_CAPITAL;
    let mut entry_price: Option<f64> = None;
    let mut closed_trades = 0u64;
    let mut equity = Vec::with_capacity(candles.len());

    for candle in candles {
        let price = candle.close;
        match (strategy.next(price, entry_price.is_some()), entry_price) {
            (Signal::Buy, None) if price > 0.0 => entry_price = Some(price),
            (Signal::Sell, Some(entry)) => {
                capital *= 1.0 + (price - entry) / entry;
                entry_price = None;
                closed_trades += 1;
            }
            _ => {}
        }
        equity.push(capital);
    }

    Ok(BacktestMetrics::new(
        (capital / INITIAL_CAPITAL - 1.0) * 100.0,
        sharpe_ratio(&equity),
        max_drawdown_pct(&equity),
        closed_trades,
    ))
}

/// Mean over population std-dev of per-bar equity returns, annualized.
/// A flat curve scores 0.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }

    let mut returns = Vec::with_capacity(equity.len());
    returns.push(0.0);
    returns.extend(equity.windows(2).map(|w| w[1] / w[0] - 1.0));

    let std_dev = returns.iter().population_std_dev();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }
    returns.iter().mean() / std_dev * ANNUALIZATION_PERIODS.sqrt()
}

/// Worst peak-to-trough move in percent, zero or negative.
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst * 100.0
}
