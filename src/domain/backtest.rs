//! The backtest pipeline: validate, look up, fetch, simulate, post-process.
//!
//! [`run_backtest`] either returns a complete [`BacktestReport`] or exactly
//! one [`BacktestError`]. Validation always completes before any data is
//! fetched.

use std::time::Instant;

use chrono::NaiveDate;
use log::{info, warn};

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::execution::{ExecutionConfig, run_strategy};
use crate::domain::instrument::{Catalog, Category, normalize_symbol};
use crate::domain::metrics::RiskMetrics;
use crate::domain::strategy::{ParamBag, StrategyId};
use crate::domain::timeframe::Timeframe;
use crate::domain::trade_report::{
    ProcessedTrade, TradeRow, TradeStatistics, export_rows, process_trades,
};
use crate::domain::validator::{ActiveParams, check_bar_count, validate_request};
use crate::ports::data_port::{DataPort, FetchLimits, FetchRequest};

/// A single backtest as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timeframe: Timeframe,
    pub initial_cash: f64,
    pub strategy: StrategyId,
    pub params: ParamBag,
}

impl BacktestRequest {
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            symbol: normalize_symbol(&self.symbol),
            start: self.start,
            end: self.end,
            timeframe: self.timeframe,
        }
    }
}

/// Engine and fetch settings that are not part of the request itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestConfig {
    pub execution: ExecutionConfig,
    pub limits: FetchLimits,
}

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub symbol: String,
    pub instrument_name: String,
    pub category: Category,
    pub strategy: StrategyId,
    pub timeframe: Timeframe,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_cash: f64,
    pub final_value: f64,
    pub metrics: RiskMetrics,
    pub statistics: TradeStatistics,
    pub trades: Vec<ProcessedTrade>,
    pub active: ActiveParams,
    pub bars_used: usize,
    pub ignored_fills: usize,
}

impl BacktestReport {
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.display_name()
    }

    pub fn timeframe_name(&self) -> &'static str {
        self.timeframe.display_name()
    }

    /// Discrete parameters that reproduce this report through the export path.
    pub fn export_args(&self) -> ExportArgs {
        ExportArgs {
            symbol: self.symbol.clone(),
            start: self.start,
            end: self.end,
            strategy: self.strategy,
            timeframe: self.timeframe,
            cash: self.initial_cash,
            params: self
                .active
                .params
                .active()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn export_rows(&self) -> Vec<TradeRow> {
        export_rows(&self.symbol, &self.trades, self.timeframe)
    }
}

/// Request fields as discrete values, as accepted by the export command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArgs {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub strategy: StrategyId,
    pub timeframe: Timeframe,
    pub cash: f64,
    pub params: Vec<(String, f64)>,
}

impl ExportArgs {
    pub fn to_request(&self) -> BacktestRequest {
        let params = self
            .params
            .iter()
            .fold(ParamBag::new(), |bag, (k, v)| bag.with(k, *v));
        BacktestRequest {
            symbol: self.symbol.clone(),
            start: self.start,
            end: self.end,
            timeframe: self.timeframe,
            initial_cash: self.cash,
            strategy: self.strategy,
            params,
        }
    }

    /// Command-line flags for `blindquants export`, output path excluded.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "--symbol".to_string(),
            self.symbol.clone(),
            "--start".to_string(),
            self.start.format("%Y-%m-%d").to_string(),
            "--end".to_string(),
            self.end.format("%Y-%m-%d").to_string(),
            "--strategy".to_string(),
            self.strategy.id().to_string(),
            "--timeframe".to_string(),
            self.timeframe.code().to_string(),
            "--cash".to_string(),
            self.cash.to_string(),
        ];
        for (key, value) in &self.params {
            args.push("--param".to_string());
            args.push(format!("{}={}", key, value));
        }
        args
    }
}

/// Run one backtest end to end.
pub fn run_backtest(
    request: &BacktestRequest,
    catalog: &Catalog,
    data: &dyn DataPort,
    config: &BacktestConfig,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<BacktestReport, BacktestError> {
    let validated = validate_request(request, today, cancel)?;
    let active = validated.active;
    let instrument = catalog.lookup(&request.symbol)?;
    let symbol = instrument.symbol.clone();
    let timeframe = request.timeframe;

    info!(
        "Backtesting {} with {} on {} from {} to {}",
        symbol, active.params, timeframe, request.start, request.end
    );

    let fetch = FetchRequest {
        symbol: symbol.clone(),
        ..request.fetch_request()
    };
    let started = Instant::now();
    let bars = data.fetch_ohlcv(&fetch, &config.limits, cancel)?;
    config.limits.check_deadline(&symbol, started)?;
    config.limits.check_bar_count(&symbol, bars.len())?;
    cancel.check()?;

    if bars.is_empty() {
        return Err(BacktestError::data_unavailable(
            &symbol,
            format!("No data found for {} ({}).", symbol, timeframe.display_name()),
        ));
    }
    info!(
        "Fetched {} bars for {} from {}",
        bars.len(),
        symbol,
        data.source_name()
    );

    check_bar_count(bars.len(), active.min_data_needed, &symbol, timeframe)?;

    let run = run_strategy(
        &bars,
        &active.params,
        request.initial_cash,
        &config.execution,
        cancel,
    )?;
    if run.ignored_fills > 0 {
        warn!(
            "{} fill notification(s) without a matching trade were ignored",
            run.ignored_fills
        );
    }

    let (trades, statistics) = process_trades(&run.closed_trades, request.initial_cash, cancel)?;
    let metrics = RiskMetrics::compute(&run.equity_curve, request.initial_cash, timeframe);

    info!(
        "Finished {}: {} trades, final value {:.2}",
        symbol, statistics.total_trades, run.final_value
    );

    Ok(BacktestReport {
        symbol,
        instrument_name: instrument.name.clone(),
        category: instrument.category,
        strategy: request.strategy,
        timeframe,
        start: request.start,
        end: request.end,
        initial_cash: request.initial_cash,
        final_value: run.final_value,
        metrics,
        statistics,
        trades,
        active,
        bars_used: bars.len(),
        ignored_fills: run.ignored_fills,
    })
}
