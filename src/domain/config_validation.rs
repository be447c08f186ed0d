//! Configuration validation.
//!
//! Checks that config values are present and well-formed before a request is
//! built from them. Semantic request checks (date windows, strategy
//! parameter rules) belong to the validator.

use chrono::NaiveDate;

use crate::domain::error::BacktestError;
use crate::domain::strategy::{StrategyId, is_known_param};
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

/// Data source used when `[data] source` is not set.
#[cfg(feature = "yahoo")]
pub const DEFAULT_DATA_SOURCE: &str = "yahoo";
#[cfg(not(feature = "yahoo"))]
pub const DEFAULT_DATA_SOURCE: &str = "csv";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_symbol(config)?;
    parse_date(config, "start_date")?;
    parse_date(config, "end_date")?;
    validate_timeframe(config)?;
    validate_initial_cash(config)?;
    validate_position_pct(config)?;
    validate_commission(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_strategy_id(config)?;
    validate_strategy_params(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match data_source(config).as_str() {
        "csv" => {
            required_string(config, "data", "csv_dir")?;
        }
        "yahoo" => {}
        other => {
            return Err(invalid(
                "data",
                "source",
                format!("unknown data source '{}' (expected csv or yahoo)", other),
            ));
        }
    }

    if let Some(timeout) = parse_number(config, "data", "timeout_secs")? {
        if timeout <= 0.0 {
            return Err(invalid("data", "timeout_secs", "timeout_secs must be positive"));
        }
    }
    if let Some(max_bars) = parse_number(config, "data", "max_bars")? {
        if max_bars < 1.0 || max_bars.fract() != 0.0 {
            return Err(invalid(
                "data",
                "max_bars",
                "max_bars must be a positive whole number",
            ));
        }
    }
    Ok(())
}

/// Configured data source, lower-cased, or [`DEFAULT_DATA_SOURCE`].
pub fn data_source(config: &dyn ConfigPort) -> String {
    config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> BacktestError {
    BacktestError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Non-empty trimmed value of a required key.
pub fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, BacktestError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

/// `Ok(None)` when the key is absent, an error when it is not a number.
pub fn parse_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", s.trim()))),
    }
}

pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, BacktestError> {
    let value = required_string(config, "backtest", key)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            key,
            format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    required_string(config, "backtest", "symbol").map(|_| ())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(value) = config.get_string("backtest", "timeframe") {
        value
            .parse::<Timeframe>()
            .map_err(|e| invalid("backtest", "timeframe", e.to_string()))?;
    }
    Ok(())
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    parse_number(config, "backtest", "initial_cash")?
        .ok_or_else(|| missing("backtest", "initial_cash"))
        .map(|_| ())
}

fn validate_position_pct(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(value) = parse_number(config, "backtest", "position_pct")? {
        if value <= 0.0 || value > 100.0 {
            return Err(invalid(
                "backtest",
                "position_pct",
                "position_pct must be in (0, 100]",
            ));
        }
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if let Some(value) = parse_number(config, "backtest", "commission_pct")? {
        if value < 0.0 {
            return Err(invalid(
                "backtest",
                "commission_pct",
                "commission_pct must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_strategy_id(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let id = required_string(config, "strategy", "id")?;
    id.parse::<StrategyId>()
        .map_err(|e| invalid("strategy", "id", e.to_string()))?;
    Ok(())
}

fn validate_strategy_params(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    for key in config.keys("strategy") {
        if key == "id" {
            continue;
        }
        if !is_known_param(&key) {
            return Err(invalid(
                "strategy",
                &key,
                "unknown strategy parameter",
            ));
        }
        parse_number(config, "strategy", &key)?;
    }
    Ok(())
}
