//! The five long-only strategies and their decision rules.
//!
//! Strategies form a closed set. Each one is a pure function of the current
//! bar view, the position state and its parameters, selected through a
//! static table indexed by [`StrategyId`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::BacktestError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{IndicatorFrame, crossed_above, crossed_below};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    SmaCross = 0,
    Rsi = 1,
    Bollinger = 2,
    Macd = 3,
    Donchian = 4,
}

impl StrategyId {
    pub const ALL: [StrategyId; 5] = [
        StrategyId::SmaCross,
        StrategyId::Rsi,
        StrategyId::Bollinger,
        StrategyId::Macd,
        StrategyId::Donchian,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            StrategyId::SmaCross => "sma_cross",
            StrategyId::Rsi => "rsi_strategy",
            StrategyId::Bollinger => "bb_strategy",
            StrategyId::Macd => "macd_strategy",
            StrategyId::Donchian => "donchian_strategy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyId::SmaCross => "Simple Moving Average Cross",
            StrategyId::Rsi => "RSI (Oversold/Overbought)",
            StrategyId::Bollinger => "Bollinger Bands (Mean Reversion)",
            StrategyId::Macd => "MACD Crossover",
            StrategyId::Donchian => "Donchian Channel Breakout",
        }
    }

    /// Parameter keys read by this strategy, in display order.
    pub fn param_keys(&self) -> &'static [&'static str] {
        match self {
            StrategyId::SmaCross => &[SMA_FAST, SMA_SLOW],
            StrategyId::Rsi => &[RSI_PERIOD, RSI_UPPER, RSI_LOWER],
            StrategyId::Bollinger => &[BB_PERIOD, BB_DEVFACTOR],
            StrategyId::Macd => &[MACD_FAST, MACD_SLOW, MACD_SIGNAL],
            StrategyId::Donchian => &[DONCHIAN_PERIOD],
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyId {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        StrategyId::ALL
            .into_iter()
            .find(|id| id.id() == needle)
            .ok_or_else(|| BacktestError::validation(format!("Unknown strategy: {}.", s.trim())))
    }
}

pub const SMA_FAST: &str = "sma_fast_period";
pub const SMA_SLOW: &str = "sma_slow_period";
pub const RSI_PERIOD: &str = "rsi_period";
pub const RSI_UPPER: &str = "rsi_upper";
pub const RSI_LOWER: &str = "rsi_lower";
pub const BB_PERIOD: &str = "bb_period";
pub const BB_DEVFACTOR: &str = "bb_devfactor";
pub const MACD_FAST: &str = "macd_fast_period";
pub const MACD_SLOW: &str = "macd_slow_period";
pub const MACD_SIGNAL: &str = "macd_signal_period";
pub const DONCHIAN_PERIOD: &str = "donchian_period";

const PARAM_DEFAULTS: [(&str, f64); 11] = [
    (SMA_FAST, 10.0),
    (SMA_SLOW, 30.0),
    (RSI_PERIOD, 14.0),
    (RSI_UPPER, 70.0),
    (RSI_LOWER, 30.0),
    (BB_PERIOD, 20.0),
    (BB_DEVFACTOR, 2.0),
    (MACD_FAST, 12.0),
    (MACD_SLOW, 26.0),
    (MACD_SIGNAL, 9.0),
    (DONCHIAN_PERIOD, 20.0),
];

pub fn default_param(key: &str) -> Option<f64> {
    PARAM_DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

pub fn is_known_param(key: &str) -> bool {
    default_param(key).is_some()
}

/// Raw strategy parameters as supplied by the caller. Missing keys fall back
/// to their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBag {
    values: BTreeMap<String, f64>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.trim().to_lowercase(), value);
    }

    /// The supplied value, or the default for a known key.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().or_else(|| default_param(key))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Parse a `key=value` assignment.
    pub fn parse_assignment(text: &str) -> Result<(String, f64), BacktestError> {
        let invalid = || {
            BacktestError::validation(format!(
                "Invalid strategy parameter '{}'; expected key=number.",
                text.trim()
            ))
        };
        let (key, value) = text.split_once('=').ok_or_else(invalid)?;
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(invalid());
        }
        let value: f64 = value.trim().parse().map_err(|_| invalid())?;
        Ok((key, value))
    }
}

/// Validated, typed parameters of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyParams {
    SmaCross { fast: usize, slow: usize },
    Rsi { period: usize, upper: f64, lower: f64 },
    Bollinger { period: usize, devfactor: f64 },
    Macd { fast: usize, slow: usize, signal: usize },
    Donchian { period: usize },
}

impl StrategyParams {
    pub fn id(&self) -> StrategyId {
        match self {
            StrategyParams::SmaCross { .. } => StrategyId::SmaCross,
            StrategyParams::Rsi { .. } => StrategyId::Rsi,
            StrategyParams::Bollinger { .. } => StrategyId::Bollinger,
            StrategyParams::Macd { .. } => StrategyId::Macd,
            StrategyParams::Donchian { .. } => StrategyId::Donchian,
        }
    }

    /// Bars the strategy's indicators need before producing a signal.
    pub fn min_data_needed(&self) -> usize {
        match self {
            StrategyParams::SmaCross { fast, slow } => (*fast).max(*slow),
            StrategyParams::Rsi { period, .. } => *period,
            StrategyParams::Bollinger { period, .. } => *period,
            StrategyParams::Macd { slow, signal, .. } => {
                slow.saturating_add(*signal).saturating_add(10)
            }
            StrategyParams::Donchian { period } => *period,
        }
    }

    /// Active parameters as `(key, value)` pairs in display order.
    pub fn active(&self) -> Vec<(&'static str, f64)> {
        match self {
            StrategyParams::SmaCross { fast, slow } => {
                vec![(SMA_FAST, *fast as f64), (SMA_SLOW, *slow as f64)]
            }
            StrategyParams::Rsi {
                period,
                upper,
                lower,
            } => vec![
                (RSI_PERIOD, *period as f64),
                (RSI_UPPER, *upper),
                (RSI_LOWER, *lower),
            ],
            StrategyParams::Bollinger { period, devfactor } => {
                vec![(BB_PERIOD, *period as f64), (BB_DEVFACTOR, *devfactor)]
            }
            StrategyParams::Macd { fast, slow, signal } => vec![
                (MACD_FAST, *fast as f64),
                (MACD_SLOW, *slow as f64),
                (MACD_SIGNAL, *signal as f64),
            ],
            StrategyParams::Donchian { period } => vec![(DONCHIAN_PERIOD, *period as f64)],
        }
    }

    pub fn to_bag(&self) -> ParamBag {
        self.active()
            .into_iter()
            .fold(ParamBag::new(), |bag, (k, v)| bag.with(k, v))
    }

    /// Indicator keys this strategy reads from the frame.
    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        match self {
            StrategyParams::SmaCross { fast, slow } => {
                vec![IndicatorType::Sma(*fast), IndicatorType::Sma(*slow)]
            }
            StrategyParams::Rsi { period, .. } => vec![IndicatorType::Rsi(*period)],
            StrategyParams::Bollinger { period, devfactor } => vec![IndicatorType::Bollinger {
                period: *period,
                stddev_mult_x100: (devfactor * 100.0).round().max(0.0) as u32,
            }],
            StrategyParams::Macd { fast, slow, signal } => vec![IndicatorType::Macd {
                fast: *fast,
                slow: *slow,
                signal: *signal,
            }],
            StrategyParams::Donchian { period } => vec![IndicatorType::Donchian(*period)],
        }
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .active()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}({})", self.id(), parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

/// Read-only view of the series at the bar being decided on.
#[derive(Debug, Clone, Copy)]
pub struct BarView<'a> {
    pub index: usize,
    pub bars: &'a [OhlcvBar],
    pub indicators: &'a IndicatorFrame,
}

impl<'a> BarView<'a> {
    pub fn bar(&self) -> &'a OhlcvBar {
        &self.bars[self.index]
    }

    fn series(&self, key: &IndicatorType) -> Option<&'a IndicatorSeries> {
        self.indicators.get(key)
    }

    fn value(&self, key: &IndicatorType) -> Option<&'a IndicatorValue> {
        self.series(key)?.valid_at(self.index)
    }
}

pub type DecisionFn = fn(&BarView<'_>, PositionState, &StrategyParams) -> Decision;

pub struct StrategyEntry {
    pub id: StrategyId,
    pub decide: DecisionFn,
}

static STRATEGY_TABLE: [StrategyEntry; 5] = [
    StrategyEntry {
        id: StrategyId::SmaCross,
        decide: decide_sma_cross,
    },
    StrategyEntry {
        id: StrategyId::Rsi,
        decide: decide_rsi,
    },
    StrategyEntry {
        id: StrategyId::Bollinger,
        decide: decide_bollinger,
    },
    StrategyEntry {
        id: StrategyId::Macd,
        decide: decide_macd,
    },
    StrategyEntry {
        id: StrategyId::Donchian,
        decide: decide_donchian,
    },
];

pub fn strategy_entry(id: StrategyId) -> &'static StrategyEntry {
    &STRATEGY_TABLE[id as usize]
}

/// Run the decision rule of `params`' strategy on one bar.
pub fn decide(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    (strategy_entry(params.id()).decide)(view, state, params)
}

fn entry_or_exit(state: PositionState, enter: bool, exit: bool) -> Decision {
    match state {
        PositionState::Flat if enter => Decision::Buy,
        PositionState::Long if exit => Decision::Sell,
        _ => Decision::Hold,
    }
}

fn decide_sma_cross(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    let StrategyParams::SmaCross { fast, slow } = params else {
        return Decision::Hold;
    };
    let (Some(fast), Some(slow)) = (
        view.series(&IndicatorType::Sma(*fast)),
        view.series(&IndicatorType::Sma(*slow)),
    ) else {
        return Decision::Hold;
    };
    entry_or_exit(
        state,
        crossed_above(fast, slow, view.index),
        crossed_below(fast, slow, view.index),
    )
}

fn decide_rsi(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    let StrategyParams::Rsi {
        period,
        upper,
        lower,
    } = params
    else {
        return Decision::Hold;
    };
    match view.value(&IndicatorType::Rsi(*period)) {
        Some(IndicatorValue::Simple(rsi)) => entry_or_exit(state, rsi < lower, rsi > upper),
        _ => Decision::Hold,
    }
}

fn decide_bollinger(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    let Some(key) = params.indicator_types().into_iter().next() else {
        return Decision::Hold;
    };
    let close = view.bar().close;
    match view.value(&key) {
        Some(IndicatorValue::Bollinger { upper, lower, .. }) => {
            entry_or_exit(state, close < *lower, close > *upper)
        }
        _ => Decision::Hold,
    }
}

fn decide_macd(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    let StrategyParams::Macd { fast, slow, signal } = params else {
        return Decision::Hold;
    };
    let key = IndicatorType::Macd {
        fast: *fast,
        slow: *slow,
        signal: *signal,
    };
    match view.value(&key) {
        Some(IndicatorValue::Macd { line, signal, .. }) => {
            entry_or_exit(state, line > signal, line < signal)
        }
        _ => Decision::Hold,
    }
}

fn decide_donchian(view: &BarView<'_>, state: PositionState, params: &StrategyParams) -> Decision {
    let StrategyParams::Donchian { period } = params else {
        return Decision::Hold;
    };
    let close = view.bar().close;
    match view.value(&IndicatorType::Donchian(*period)) {
        Some(IndicatorValue::Channel { upper, lower }) => {
            entry_or_exit(state, close > *upper, close < *lower)
        }
        _ => Decision::Hold,
    }
}
