//! Shared helpers for building and reading indicator series.

use std::collections::HashMap;

use crate::domain::indicator::{
    IndicatorSeries, IndicatorType, calculate_bollinger, calculate_donchian, calculate_macd,
    calculate_rsi, calculate_sma,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::StrategyParams;

/// All indicator series one strategy run reads, keyed by indicator identity.
pub type IndicatorFrame = HashMap<IndicatorType, IndicatorSeries>;

/// Precompute every indicator the strategy needs over the full series.
pub fn compute_indicators(bars: &[OhlcvBar], params: &StrategyParams) -> IndicatorFrame {
    let series: Vec<IndicatorSeries> = match params {
        StrategyParams::SmaCross { fast, slow } => {
            vec![calculate_sma(bars, *fast), calculate_sma(bars, *slow)]
        }
        StrategyParams::Rsi { period, .. } => vec![calculate_rsi(bars, *period)],
        StrategyParams::Bollinger { period, devfactor } => {
            vec![calculate_bollinger(bars, *period, *devfactor)]
        }
        StrategyParams::Macd { fast, slow, signal } => {
            vec![calculate_macd(bars, *fast, *slow, *signal)]
        }
        StrategyParams::Donchian { period } => vec![calculate_donchian(bars, *period)],
    };

    series
        .into_iter()
        .map(|s| (s.indicator_type.clone(), s))
        .collect()
}

/// `a` crossed from at-or-below `b` on bar i-1 to strictly above on bar i.
pub fn crossed_above(a: &IndicatorSeries, b: &IndicatorSeries, i: usize) -> bool {
    match pair_window(a, b, i) {
        Some(((a_prev, b_prev), (a_now, b_now))) => a_prev <= b_prev && a_now > b_now,
        None => false,
    }
}

/// `a` crossed from at-or-above `b` on bar i-1 to strictly below on bar i.
pub fn crossed_below(a: &IndicatorSeries, b: &IndicatorSeries, i: usize) -> bool {
    match pair_window(a, b, i) {
        Some(((a_prev, b_prev), (a_now, b_now))) => a_prev >= b_prev && a_now < b_now,
        None => false,
    }
}

type Pair = (f64, f64);

fn pair_window(a: &IndicatorSeries, b: &IndicatorSeries, i: usize) -> Option<(Pair, Pair)> {
    let prev = i.checked_sub(1)?;
    Some((
        (a.simple_at(prev)?, b.simple_at(prev)?),
        (a.simple_at(i)?, b.simple_at(i)?),
    ))
}
