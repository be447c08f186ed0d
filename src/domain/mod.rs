//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod error;
pub mod cancel;
pub mod instrument;
pub mod indicator;
pub mod indicator_helpers;
pub mod strategy;
pub mod validator;
pub mod position;
pub mod portfolio;
pub mod recorder;
pub mod execution;
pub mod trade_report;
pub mod metrics;
pub mod backtest;
pub mod config_validation;
