//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::catalog_csv;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    self as backtest_engine, BacktestConfig, BacktestReport, BacktestRequest, ExportArgs,
};
use crate::domain::cancel::CancelToken;
use crate::domain::config_validation::{
    data_source, parse_date, parse_number, required_string, validate_backtest_config,
    validate_data_config, validate_strategy_config,
};
use crate::domain::error::BacktestError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::instrument::{Catalog, Category, PopulateSummary};
use crate::domain::strategy::{ParamBag, StrategyId};
use crate::domain::timeframe::Timeframe;
use crate::domain::validator::validate_request;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, FetchLimits};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "blindquants", about = "Single-strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest from a config file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Write the trade table to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Validate a config file and its request without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Re-run a backtest from discrete parameters and write the trade table
    Export {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        strategy: String,
        #[arg(long, default_value = "1d")]
        timeframe: String,
        #[arg(long)]
        cash: f64,
        /// Strategy parameter as key=value; repeatable
        #[arg(long = "param")]
        params: Vec<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the instrument catalog
    Symbols {
        /// idx, stk, cry or com
        #[arg(long)]
        category: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the seeded instrument catalog to a CSV file
    PopulateSymbols {
        #[arg(short, long)]
        output: PathBuf,
        /// Drop existing entries before seeding
        #[arg(long)]
        clear: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            strategy,
            timeframe,
            export,
        } => run_backtest(
            &config,
            &Overrides {
                symbol,
                strategy,
                timeframe,
            },
            export.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Export {
            symbol,
            start,
            end,
            strategy,
            timeframe,
            cash,
            params,
            config,
            output,
        } => {
            let args = match parse_export_args(
                &symbol, &start, &end, &strategy, &timeframe, cash, &params,
            ) {
                Ok(a) => a,
                Err(e) => return fail(&e),
            };
            run_export(&args, config.as_deref(), &output)
        }
        Command::Symbols { category, config } => {
            run_symbols(category.as_deref(), config.as_deref())
        }
        Command::PopulateSymbols { output, clear } => run_populate_symbols(&output, clear),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub timeframe: Option<String>,
}

fn fail(e: &BacktestError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = BacktestError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn parse_timeframe(value: &str) -> Result<Timeframe, BacktestError> {
    value
        .parse::<Timeframe>()
        .map_err(|e| BacktestError::validation(e.to_string()))
}

/// Build the request from `[backtest]` and `[strategy]`, applying overrides.
pub fn build_request(
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<BacktestRequest, BacktestError> {
    let symbol = match &overrides.symbol {
        Some(s) => s.clone(),
        None => required_string(config, "backtest", "symbol")?,
    };
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;

    let timeframe = match &overrides.timeframe {
        Some(tf) => parse_timeframe(tf)?,
        None => match config.get_string("backtest", "timeframe") {
            Some(tf) => tf.parse::<Timeframe>().map_err(|e| BacktestError::ConfigInvalid {
                section: "backtest".into(),
                key: "timeframe".into(),
                reason: e.to_string(),
            })?,
            None => Timeframe::Daily,
        },
    };

    let initial_cash = parse_number(config, "backtest", "initial_cash")?.ok_or_else(|| {
        BacktestError::ConfigMissing {
            section: "backtest".into(),
            key: "initial_cash".into(),
        }
    })?;

    let strategy = match &overrides.strategy {
        Some(id) => id.parse::<StrategyId>()?,
        None => required_string(config, "strategy", "id")?.parse::<StrategyId>()?,
    };

    let mut params = ParamBag::new();
    for key in config.keys("strategy") {
        if key == "id" {
            continue;
        }
        if let Some(value) = parse_number(config, "strategy", &key)? {
            params.set(&key, value);
        }
    }

    Ok(BacktestRequest {
        symbol,
        start,
        end,
        timeframe,
        initial_cash,
        strategy,
        params,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let defaults = BacktestConfig::default();
    let execution = ExecutionConfig {
        position_pct: parse_number(config, "backtest", "position_pct")?
            .unwrap_or(defaults.execution.position_pct),
        commission_pct: parse_number(config, "backtest", "commission_pct")?
            .unwrap_or(defaults.execution.commission_pct),
    };
    let limits = FetchLimits {
        timeout: parse_number(config, "data", "timeout_secs")?
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.limits.timeout),
        max_bars: parse_number(config, "data", "max_bars")?
            .filter(|n| *n >= 1.0)
            .map(|n| n as usize)
            .unwrap_or(defaults.limits.max_bars),
    };
    Ok(BacktestConfig { execution, limits })
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BacktestError> {
    match data_source(config).as_str() {
        "csv" => {
            let dir = required_string(config, "data", "csv_dir")?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => Ok(Box::new(crate::adapters::yahoo_adapter::YahooAdapter::new()?)),
        other => Err(BacktestError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("data source '{}' is not available in this build", other),
        }),
    }
}

/// The catalog named by `[catalog] path`, or the built-in one.
pub fn load_catalog(config: Option<&dyn ConfigPort>) -> Result<Catalog, BacktestError> {
    match config.and_then(|c| c.get_string("catalog", "path")) {
        Some(path) if !path.trim().is_empty() => catalog_csv::load_catalog(Path::new(path.trim())),
        _ => Ok(Catalog::builtin()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn validate_config(adapter: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_backtest_config(adapter)?;
    validate_strategy_config(adapter)?;
    validate_data_config(adapter)?;
    Ok(())
}

fn run_backtest(config_path: &Path, overrides: &Overrides, export_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate config sections
    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }

    // Stage 3: Build request, engine settings and collaborators
    let request = match build_request(&adapter, overrides) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let catalog = match load_catalog(Some(&adapter)) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let data = match build_data_port(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    // Stage 4: Run the pipeline
    let cancel = CancelToken::new();
    let report = match backtest_engine::run_backtest(
        &request,
        &catalog,
        data.as_ref(),
        &bt_config,
        today(),
        &cancel,
    ) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Print summary
    print_summary(&report);

    // Stage 6: Export trades
    if let Some(path) = export_path {
        if let Err(e) = CsvReportAdapter::new().write(&report, path) {
            return fail(&e);
        }
        eprintln!("Trades written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }
    let request = match build_request(&adapter, &Overrides::default()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let validated = match validate_request(&request, today(), &CancelToken::new()) {
        Ok(v) => v,
        Err(e) => return fail(&e),
    };
    let catalog = match load_catalog(Some(&adapter)) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let instrument = match catalog.lookup(&request.symbol) {
        Ok(i) => i,
        Err(e) => return fail(&e),
    };

    eprintln!("Configuration is valid.");
    eprintln!("Instrument:       {} ({})", instrument.name, instrument);
    eprintln!("Strategy:         {}", validated.active.params);
    eprintln!("Timeframe:        {}", request.timeframe.display_name());
    eprintln!("Min data needed:  {}", validated.active.min_data_needed);
    eprintln!("Bars required:    more than {}", validated.active.required_bars());
    ExitCode::SUCCESS
}

pub fn parse_export_args(
    symbol: &str,
    start: &str,
    end: &str,
    strategy: &str,
    timeframe: &str,
    cash: f64,
    params: &[String],
) -> Result<ExportArgs, BacktestError> {
    let date = |value: &str, name: &str| {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
            BacktestError::validation(format!(
                "Invalid {} date '{}'; expected YYYY-MM-DD.",
                name, value
            ))
        })
    };
    Ok(ExportArgs {
        symbol: symbol.to_string(),
        start: date(start, "start")?,
        end: date(end, "end")?,
        strategy: strategy.parse::<StrategyId>()?,
        timeframe: parse_timeframe(timeframe)?,
        cash,
        params: params
            .iter()
            .map(|p| ParamBag::parse_assignment(p))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn run_export(args: &ExportArgs, config_path: Option<&Path>, output: &Path) -> ExitCode {
    let adapter = match config_path {
        Some(path) => match load_config(path) {
            Ok(a) => a,
            Err(code) => return code,
        },
        None => match FileConfigAdapter::from_string("") {
            Ok(a) => a,
            Err(reason) => {
                return fail(&BacktestError::ConfigParse {
                    file: "<defaults>".into(),
                    reason,
                });
            }
        },
    };
    if let Err(e) = validate_data_config(&adapter) {
        return fail(&e);
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let catalog = match load_catalog(Some(&adapter)) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let data = match build_data_port(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    let report = match backtest_engine::run_backtest(
        &args.to_request(),
        &catalog,
        data.as_ref(),
        &bt_config,
        today(),
        &CancelToken::new(),
    ) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    if let Err(e) = CsvReportAdapter::new().write(&report, output) {
        return fail(&e);
    }
    eprintln!(
        "Exported {} trades for {} to {}",
        report.statistics.total_trades,
        report.symbol,
        output.display()
    );
    ExitCode::SUCCESS
}

fn run_symbols(category: Option<&str>, config_path: Option<&Path>) -> ExitCode {
    let adapter = match config_path.map(load_config).transpose() {
        Ok(a) => a,
        Err(code) => return code,
    };
    let catalog = match load_catalog(adapter.as_ref().map(|a| a as &dyn ConfigPort)) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let filter = match category.map(str::parse::<Category>).transpose() {
        Ok(f) => f,
        Err(e) => return fail(&BacktestError::validation(e.to_string())),
    };

    let mut count = 0;
    for instrument in catalog.iter().filter(|i| filter.is_none_or(|c| i.category == c)) {
        println!(
            "{:<12} {:<4} {}",
            instrument.symbol,
            instrument.category.code(),
            instrument.name
        );
        count += 1;
    }
    eprintln!("{} instrument(s)", count);
    ExitCode::SUCCESS
}

/// Seed the catalog file at `output`, merging into or clearing what is there.
pub fn populate_catalog_file(
    output: &Path,
    clear: bool,
) -> Result<PopulateSummary, BacktestError> {
    let mut catalog = if output.exists() {
        catalog_csv::load_catalog(output)?
    } else {
        Catalog::new()
    };
    let summary = catalog.populate(Catalog::seed_entries(), clear);
    catalog_csv::save_catalog(&catalog, output)?;
    Ok(summary)
}

fn run_populate_symbols(output: &Path, clear: bool) -> ExitCode {
    let summary = match populate_catalog_file(output, clear) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if summary.removed > 0 {
        eprintln!("Removed {} existing instrument(s).", summary.removed);
    }
    eprintln!(
        "Catalog written to {}: {} created, {} updated, {} unchanged.",
        output.display(),
        summary.created,
        summary.updated,
        summary.unchanged
    );
    ExitCode::SUCCESS
}

fn fmt_optional(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "unavailable".to_string(),
    }
}

pub fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    let s = &report.statistics;

    eprintln!();
    eprintln!("=== Backtest Results ===");
    eprintln!("Instrument:       {} ({})", report.instrument_name, report.symbol);
    eprintln!("Category:         {}", report.category);
    eprintln!("Strategy:         {}", report.strategy_name());
    eprintln!("Parameters:       {}", report.active.params);
    eprintln!("Timeframe:        {}", report.timeframe_name());
    eprintln!("Period:           {} to {}", report.start, report.end);
    eprintln!(
        "Bars used:        {} (min {})",
        report.bars_used, report.active.min_data_needed
    );
    eprintln!("Initial Cash:     {:.2}", report.initial_cash);
    eprintln!("Final Value:      {:.2}", report.final_value);
    eprintln!("Total Return:     {:.2}%", m.total_return_pct);
    eprintln!("CAGR:             {}", fmt_optional(m.cagr_pct, "%"));
    eprintln!("Sharpe Ratio:     {}", fmt_optional(m.sharpe_ratio, ""));
    eprintln!("Sortino Ratio:    {}", fmt_optional(m.sortino_ratio, ""));
    eprintln!(
        "Max Drawdown:     {:.2}% ({} bars)",
        m.max_drawdown_pct, m.max_drawdown_bars
    );
    eprintln!("Volatility:       {:.2}%", m.annual_volatility_pct);
    eprintln!(
        "Trades:           {} ({} won, {} lost)",
        s.total_trades, s.winning_trades, s.losing_trades
    );
    eprintln!("Win Rate:         {}", fmt_optional(s.win_rate(), "%"));
    eprintln!("Best Trade:       {:.2}", s.max_profit_trade);
    eprintln!("Largest Loss:     {:.2}", s.max_loss_trade);
    eprintln!("Net P/L:          {:.2}", s.pnl_net);
    if report.ignored_fills > 0 {
        eprintln!("Ignored fills:    {}", report.ignored_fills);
    }

    if !report.trades.is_empty() {
        eprintln!();
        eprintln!(
            "{:>3}  {:<16}  {:>10}  {:<16}  {:>10}  {:>12}  {:>12}",
            "#", "Date In", "Price In", "Date Out", "Price Out", "P/L (Net)", "Balance"
        );
        for row in report.export_rows() {
            eprintln!(
                "{:>3}  {:<16}  {:>10}  {:<16}  {:>10}  {:>12}  {:>12}",
                row.number,
                row.date_in,
                row.price_in,
                row.date_out,
                row.price_out,
                row.pnl_net,
                row.balance
            );
        }
    }

    eprintln!();
    eprintln!(
        "Reproduce with: blindquants export {} -o trades.csv",
        report.export_args().to_cli_args().join(" ")
    );
}
