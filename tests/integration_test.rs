//! End-to-end pipeline tests against an in-memory data port.

mod common;

use approx::assert_relative_eq;
use blindquants::adapters::csv_report_adapter::CsvReportAdapter;
use blindquants::domain::backtest::{BacktestConfig, BacktestReport, BacktestRequest, run_backtest};
use blindquants::domain::cancel::CancelToken;
use blindquants::domain::error::{BacktestError, ErrorKind};
use blindquants::domain::instrument::Catalog;
use blindquants::domain::position::TradeType;
use blindquants::domain::strategy::{ParamBag, SMA_FAST, SMA_SLOW, StrategyId};
use blindquants::domain::timeframe::Timeframe;
use blindquants::ports::report_port::ReportPort;
use chrono::Duration;
use common::*;

fn today() -> chrono::NaiveDate {
    date(2025, 6, 30)
}

fn sma_request() -> BacktestRequest {
    BacktestRequest {
        symbol: "aapl".into(),
        start: date(2023, 1, 1),
        end: date(2023, 12, 31),
        timeframe: Timeframe::Daily,
        initial_cash: 10_000.0,
        strategy: StrategyId::SmaCross,
        params: ParamBag::new().with(SMA_FAST, 10.0).with(SMA_SLOW, 30.0),
    }
}

fn run(request: &BacktestRequest, port: &MockDataPort) -> Result<BacktestReport, BacktestError> {
    run_backtest(
        request,
        &Catalog::builtin(),
        port,
        &BacktestConfig::default(),
        today(),
        &CancelToken::new(),
    )
}

mod sma_cross_scenario {
    use super::*;

    #[test]
    fn produces_one_closed_trade() {
        let bars = sma_scenario_bars();
        let port = MockDataPort::new().with_bars("AAPL", bars.clone());

        let report = run(&sma_request(), &port).unwrap();

        assert_eq!(port.fetch_count(), 1);
        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.instrument_name, "Apple Inc.");
        assert_eq!(report.strategy_name(), "Simple Moving Average Cross");
        assert_eq!(report.timeframe_name(), "Daily (1d)");
        assert_eq!(report.bars_used, 300);
        assert_eq!(report.active.min_data_needed, 30);
        assert_eq!(report.trades.len(), 1);

        let processed = &report.trades[0];
        let trade = &processed.trade;
        assert_eq!(processed.number, 1);
        assert_eq!(trade.trade_type, TradeType::Long);
        assert_eq!(trade.entry_time, bars[51].time);
        assert_eq!(trade.exit_time, bars[121].time);
        assert_relative_eq!(trade.entry_price, 102.25);
        assert_relative_eq!(trade.exit_price, 10.25);

        let size = 9_000.0 / 102.25;
        assert_relative_eq!(trade.size, size, epsilon = 1e-9);
        assert_relative_eq!(trade.pnl_net, size * (10.25 - 102.25), epsilon = 1e-6);
        assert_relative_eq!(processed.running_balance, 10_000.0 + trade.pnl_net, epsilon = 1e-9);
    }

    #[test]
    fn statistics_and_final_value() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let report = run(&sma_request(), &port).unwrap();

        let stats = &report.statistics;
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.winning_trades, 0);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.max_profit_trade, 0.0);
        assert_relative_eq!(stats.max_loss_trade, -stats.pnl_net, epsilon = 1e-9);
        assert_relative_eq!(report.final_value, 10_000.0 + stats.pnl_net, epsilon = 1e-6);
        assert!(report.metrics.max_drawdown_pct > 0.0);
        assert!(report.metrics.total_return_pct < 0.0);
    }

    #[test]
    fn export_rows_match_trade() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let report = run(&sma_request(), &port).unwrap();

        let rows = report.export_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[0].trade_type, "Long");
        assert_eq!(rows[0].date_in, "2023-02-21");
        assert_eq!(rows[0].price_in, "102.25");
        assert_eq!(rows[0].date_out, "2023-05-02");
        assert_eq!(rows[0].price_out, "10.25");
    }

    #[test]
    fn export_args_reproduce_the_same_rows() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let report = run(&sma_request(), &port).unwrap();

        let again = run(&report.export_args().to_request(), &port).unwrap();

        assert_eq!(port.fetch_count(), 2);
        assert_eq!(again.export_rows(), report.export_rows());
        assert_eq!(again.final_value, report.final_value);
    }

    #[test]
    fn csv_report_is_written() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let report = run(&sma_request(), &port).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");

        CsvReportAdapter::new().write(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("#,Symbol,Type,Date In,Price In,Date Out,Price Out,Size,P/L (Net),Balance")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,AAPL,Long,2023-02-21,102.25,2023-05-02,10.25,"));
        assert_eq!(lines.next(), None);
    }
}

mod rejected_before_fetch {
    use super::*;

    #[test]
    fn hourly_range_beyond_two_years() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let request = BacktestRequest {
            timeframe: Timeframe::Hourly,
            start: today() - Duration::days(800),
            end: today(),
            ..sma_request()
        };

        let err = run(&request, &port).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("Data for Hourly (1h) limited to ~2 years."));
        assert_eq!(port.fetch_count(), 0);
    }

    #[test]
    fn invalid_strategy_params() {
        let port = MockDataPort::new();
        let request = BacktestRequest {
            params: ParamBag::new().with(SMA_FAST, 40.0).with(SMA_SLOW, 30.0),
            ..sma_request()
        };
        let err = run(&request, &port).unwrap_err();
        assert_eq!(err.to_string(), "SMA Fast period must be less than SMA Slow period.");
        assert_eq!(port.fetch_count(), 0);
    }

    #[test]
    fn non_positive_cash() {
        let port = MockDataPort::new();
        let request = BacktestRequest {
            initial_cash: 0.0,
            ..sma_request()
        };
        let err = run(&request, &port).unwrap_err();
        assert_eq!(err.to_string(), "Initial cash must be positive.");
        assert_eq!(port.fetch_count(), 0);
    }

    #[test]
    fn unknown_symbol() {
        let port = MockDataPort::new();
        let request = BacktestRequest {
            symbol: "zzzz".into(),
            ..sma_request()
        };
        let err = run(&request, &port).unwrap_err();
        assert_eq!(err.to_string(), "Stock ZZZZ not found.");
        assert_eq!(port.fetch_count(), 0);
    }
}

mod data_failures {
    use super::*;

    #[test]
    fn empty_series() {
        let port = MockDataPort::new();
        let err = run(&sma_request(), &port).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert_eq!(err.to_string(), "No data found for AAPL (Daily (1d)).");
    }

    #[test]
    fn too_few_bars() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars()[..60].to_vec());
        let err = run(&sma_request(), &port).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert_eq!(
            err.to_string(),
            "Data length (60) for AAPL insufficient (needs ~60 bars for Daily (1d))."
        );
    }

    #[test]
    fn one_bar_more_than_required_is_enough() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars()[..61].to_vec());
        let report = run(&sma_request(), &port).unwrap();
        assert_eq!(report.bars_used, 61);
        assert!(report.trades.is_empty());
    }

    #[test]
    fn port_error_is_surfaced() {
        let port = MockDataPort::new().with_error("AAPL", "upstream unavailable");
        let err = run(&sma_request(), &port).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::DataUnavailable { ref reason, .. } if reason == "upstream unavailable"
        ));
    }

    #[test]
    fn bar_limit_is_enforced_after_fetch() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let mut config = BacktestConfig::default();
        config.limits.max_bars = 100;
        let err = run_backtest(
            &sma_request(),
            &Catalog::builtin(),
            &port,
            &config,
            today(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn cancelled_run_returns_no_report() {
        let port = MockDataPort::new().with_bars("AAPL", sma_scenario_bars());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_backtest(
            &sma_request(),
            &Catalog::builtin(),
            &port,
            &BacktestConfig::default(),
            today(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, BacktestError::Cancelled));
        assert_eq!(port.fetch_count(), 0);
    }
}

mod every_strategy {
    use super::*;

    #[test]
    fn balances_chain_for_each_strategy() {
        let bars = daily_bars(date(2022, 1, 1), &wave_closes(400));
        let port = MockDataPort::new().with_bars("SPY", bars);

        for strategy in StrategyId::ALL {
            let request = BacktestRequest {
                symbol: "SPY".into(),
                start: date(2022, 1, 1),
                end: date(2023, 12, 31),
                timeframe: Timeframe::Daily,
                initial_cash: 25_000.0,
                strategy,
                params: ParamBag::new(),
            };
            let report = run(&request, &port).unwrap();

            let mut balance = 25_000.0;
            for (i, p) in report.trades.iter().enumerate() {
                balance += p.trade.pnl_net;
                assert_eq!(p.number, i + 1);
                assert_relative_eq!(p.running_balance, balance, epsilon = 1e-6);
                assert!(p.trade.exit_time > p.trade.entry_time);
            }
            let stats = &report.statistics;
            assert_eq!(stats.total_trades, report.trades.len());
            assert!(stats.winning_trades + stats.losing_trades <= stats.total_trades);
            assert!(stats.max_loss_trade >= 0.0);
        }
    }
}
