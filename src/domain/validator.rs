//! Backtest request validation.
//!
//! Every check here runs before any market data is fetched and reports a
//! distinct message that is surfaced to the caller verbatim. All functions
//! are pure; the current date is injected.

use chrono::{Duration, NaiveDate};

use crate::domain::backtest::BacktestRequest;
use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::strategy::{
    BB_DEVFACTOR, BB_PERIOD, DONCHIAN_PERIOD, MACD_FAST, MACD_SIGNAL, MACD_SLOW, ParamBag,
    RSI_LOWER, RSI_PERIOD, RSI_UPPER, SMA_FAST, SMA_SLOW, StrategyId, StrategyParams,
};
use crate::domain::timeframe::Timeframe;

/// Bars required on top of a strategy's minimum, for indicator warm-up and
/// at least one trading opportunity.
pub const SAFETY_MARGIN_BARS: usize = 30;

/// Largest accepted indicator period.
pub const MAX_PERIOD: f64 = 1_000_000.0;

/// Typed parameters of the selected strategy and the bars they need.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveParams {
    pub params: StrategyParams,
    pub min_data_needed: usize,
}

impl ActiveParams {
    pub fn required_bars(&self) -> usize {
        required_bars(self.min_data_needed)
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub request: BacktestRequest,
    pub active: ActiveParams,
}

pub fn required_bars(min_data_needed: usize) -> usize {
    min_data_needed.saturating_add(SAFETY_MARGIN_BARS)
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Check that `[start, end]` is orderable and reachable for `timeframe`.
pub fn validate_date_range(
    start: NaiveDate,
    end: NaiveDate,
    timeframe: Timeframe,
    today: NaiveDate,
) -> Result<(), BacktestError> {
    let span_days = (end - start).num_days();
    if span_days < 0 {
        return Err(BacktestError::validation(
            "Start date cannot be after end date.",
        ));
    }

    let Some(max_days) = timeframe.max_lookback_days() else {
        return Ok(());
    };
    let limit = timeframe.lookback_label();
    let name = timeframe.display_name();

    if span_days > max_days {
        let suggested = end - Duration::days(max_days);
        return Err(BacktestError::validation(format!(
            "Data for {} limited to {}. Your range ({} days) exceeds this. Try start date ~{}.",
            name,
            limit,
            span_days + 1,
            fmt_date(suggested)
        )));
    }

    let earliest = today - Duration::days(max_days);
    if start < earliest {
        return Err(BacktestError::validation(format!(
            "For {}, data older than {} from today (around {}) unavailable. Adjust start date.",
            name,
            limit,
            fmt_date(earliest)
        )));
    }

    Ok(())
}

pub fn validate_initial_cash(initial_cash: f64) -> Result<(), BacktestError> {
    if !(initial_cash.is_finite() && initial_cash > 0.0) {
        return Err(BacktestError::validation("Initial cash must be positive."));
    }
    Ok(())
}

/// Read a parameter that must be a whole number no larger than [`MAX_PERIOD`].
/// Sign is checked by the caller.
fn whole(bag: &ParamBag, key: &str) -> Result<f64, BacktestError> {
    let value = bag.get(key).unwrap_or(0.0);
    if value.fract() != 0.0 {
        return Err(BacktestError::validation(format!(
            "{} must be a whole number.",
            key
        )));
    }
    if value > MAX_PERIOD {
        return Err(BacktestError::validation(format!(
            "{} must not exceed {}.",
            key, MAX_PERIOD
        )));
    }
    Ok(value)
}

fn number(bag: &ParamBag, key: &str) -> f64 {
    bag.get(key).unwrap_or(0.0)
}

/// Validate the parameters of `strategy` and derive its minimum bar count.
pub fn validate_strategy_params(
    strategy: StrategyId,
    bag: &ParamBag,
) -> Result<ActiveParams, BacktestError> {
    let params = match strategy {
        StrategyId::SmaCross => {
            let fast = whole(bag, SMA_FAST)?;
            let slow = whole(bag, SMA_SLOW)?;
            if fast <= 0.0 || slow <= 0.0 {
                return Err(BacktestError::validation("SMA periods must be positive."));
            }
            if fast >= slow {
                return Err(BacktestError::validation(
                    "SMA Fast period must be less than SMA Slow period.",
                ));
            }
            StrategyParams::SmaCross {
                fast: fast as usize,
                slow: slow as usize,
            }
        }
        StrategyId::Rsi => {
            let period = whole(bag, RSI_PERIOD)?;
            let upper = number(bag, RSI_UPPER);
            let lower = number(bag, RSI_LOWER);
            if !(period > 0.0 && upper > 0.0 && lower > 0.0) {
                return Err(BacktestError::validation(
                    "RSI parameters must be positive.",
                ));
            }
            if lower >= upper {
                return Err(BacktestError::validation(
                    "RSI Lower must be less than RSI Upper.",
                ));
            }
            StrategyParams::Rsi {
                period: period as usize,
                upper,
                lower,
            }
        }
        StrategyId::Bollinger => {
            let period = whole(bag, BB_PERIOD)?;
            let devfactor = number(bag, BB_DEVFACTOR);
            if !(period > 0.0 && devfactor > 0.0 && devfactor.is_finite()) {
                return Err(BacktestError::validation(
                    "Bollinger Bands parameters must be positive.",
                ));
            }
            StrategyParams::Bollinger {
                period: period as usize,
                devfactor,
            }
        }
        StrategyId::Macd => {
            let fast = whole(bag, MACD_FAST)?;
            let slow = whole(bag, MACD_SLOW)?;
            let signal = whole(bag, MACD_SIGNAL)?;
            if fast <= 0.0 || slow <= 0.0 || signal <= 0.0 {
                return Err(BacktestError::validation(
                    "MACD parameters must be positive.",
                ));
            }
            if fast >= slow {
                return Err(BacktestError::validation(
                    "MACD Fast period must be less than MACD Slow period.",
                ));
            }
            StrategyParams::Macd {
                fast: fast as usize,
                slow: slow as usize,
                signal: signal as usize,
            }
        }
        StrategyId::Donchian => {
            let period = whole(bag, DONCHIAN_PERIOD)?;
            if period <= 0.0 {
                return Err(BacktestError::validation(
                    "Donchian period must be positive.",
                ));
            }
            StrategyParams::Donchian {
                period: period as usize,
            }
        }
    };

    Ok(ActiveParams {
        min_data_needed: params.min_data_needed(),
        params,
    })
}

/// The fetched series must hold more than `min_data_needed + 30` bars.
pub fn check_bar_count(
    bars: usize,
    min_data_needed: usize,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<(), BacktestError> {
    let required = required_bars(min_data_needed);
    if bars <= required {
        return Err(BacktestError::InsufficientData {
            symbol: symbol.to_string(),
            bars,
            required,
            timeframe: timeframe.display_name().to_string(),
        });
    }
    Ok(())
}

/// Run every request-level check in order: dates, cash, strategy parameters.
pub fn validate_request(
    request: &BacktestRequest,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<ValidatedRequest, BacktestError> {
    cancel.check()?;
    validate_date_range(request.start, request.end, request.timeframe, today)?;
    validate_initial_cash(request.initial_cash)?;
    let active = validate_strategy_params(request.strategy, &request.params)?;
    Ok(ValidatedRequest {
        request: request.clone(),
        active,
    })
}
