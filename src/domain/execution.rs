//! Bar-by-bar execution engine.
//!
//! A decision taken on bar N becomes a market order that fills at the open
//! of bar N+1 and is reported before bar N+1's own decision. Positions are
//! long-only, one at a time, sized as a fixed percentage of available cash.

use log::debug;

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{EquityPoint, Holding, Portfolio};
use crate::domain::position::{Fill, OrderSide, Trade};
use crate::domain::recorder::TradeRecorder;
use crate::domain::strategy::{BarView, Decision, StrategyParams, decide};

/// The cancel flag is polled once per this many bars.
pub const CANCEL_POLL_INTERVAL: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Share of available cash committed per entry, in percent.
    pub position_pct: f64,
    /// Commission charged on traded notional, in percent.
    pub commission_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            position_pct: 90.0,
            commission_pct: 0.0,
        }
    }
}

pub fn calculate_commission(notional: f64, config: &ExecutionConfig) -> f64 {
    notional * config.commission_pct / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Filled(Fill),
    Rejected,
}

/// Buy `position_pct` of cash at `price`. Rejected when the size is not
/// positive or cost plus commission exceeds cash.
pub fn enter_long(
    portfolio: &mut Portfolio,
    bar: &OhlcvBar,
    config: &ExecutionConfig,
) -> EntryResult {
    let price = bar.open;
    let size = portfolio.cash * config.position_pct / 100.0 / price;
    if !(size.is_finite() && size > 0.0) || portfolio.has_holding() {
        return EntryResult::Rejected;
    }

    let notional = size * price;
    let commission = calculate_commission(notional, config);
    if notional + commission > portfolio.cash {
        return EntryResult::Rejected;
    }

    portfolio.cash -= notional + commission;
    portfolio.holding = Some(Holding {
        size,
        entry_price: price,
    });
    EntryResult::Filled(Fill {
        side: OrderSide::Buy,
        time: bar.time,
        price,
        size,
        commission,
    })
}

/// Sell the whole holding at the bar's open.
pub fn exit_long(
    portfolio: &mut Portfolio,
    bar: &OhlcvBar,
    config: &ExecutionConfig,
) -> Result<Fill, BacktestError> {
    let holding = portfolio
        .holding
        .take()
        .ok_or_else(|| BacktestError::engine("sell order with no open position"))?;

    let price = bar.open;
    let notional = holding.size * price;
    let commission = calculate_commission(notional, config);
    portfolio.cash += notional - commission;

    Ok(Fill {
        side: OrderSide::Sell,
        time: bar.time,
        price,
        size: holding.size,
        commission,
    })
}

/// Everything the engine reports after replaying a series.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_value: f64,
    pub ignored_fills: usize,
}

fn check_bar(index: usize, bar: &OhlcvBar) -> Result<(), BacktestError> {
    if !bar.has_valid_prices() {
        return Err(BacktestError::engine(format!(
            "bar {} ({}) has a non-finite or non-positive price",
            index, bar.time
        )));
    }
    Ok(())
}

/// Replay `bars` through the strategy described by `params`.
pub fn run_strategy(
    bars: &[OhlcvBar],
    params: &StrategyParams,
    initial_cash: f64,
    config: &ExecutionConfig,
    cancel: &CancelToken,
) -> Result<EngineRun, BacktestError> {
    let frame = compute_indicators(bars, params);
    let mut portfolio = Portfolio::new(initial_cash);
    let mut recorder = TradeRecorder::new();

    for (index, bar) in bars.iter().enumerate() {
        if index % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        check_bar(index, bar)?;

        match recorder.pending_side() {
            Some(OrderSide::Buy) => match enter_long(&mut portfolio, bar, config) {
                EntryResult::Filled(fill) => recorder.on_fill(&fill),
                EntryResult::Rejected => recorder.on_rejected(),
            },
            Some(OrderSide::Sell) => {
                let fill = exit_long(&mut portfolio, bar, config)?;
                recorder.on_fill(&fill);
            }
            None => {}
        }

        if !recorder.is_pending() {
            let view = BarView {
                index,
                bars,
                indicators: &frame,
            };
            match decide(&view, recorder.position_state(), params) {
                Decision::Buy => recorder.submit(OrderSide::Buy)?,
                Decision::Sell => recorder.submit(OrderSide::Sell)?,
                Decision::Hold => {}
            }
        }

        portfolio.record_equity(bar.time, bar.close);
    }

    if let Some(side) = recorder.pending_side() {
        debug!("{} order still pending at end of series", side);
    }

    let final_value = portfolio.final_value();
    let ignored_fills = recorder.ignored_fills();
    Ok(EngineRun {
        closed_trades: recorder.into_closed_trades(),
        equity_curve: portfolio.equity_curve,
        final_value,
        ignored_fills,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn bars_from(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                time: start + Duration::days(i as i64),
                open: close + 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn bar_at(open: f64) -> OhlcvBar {
        bars_from(&[open - 0.5]).remove(0)
    }

    mod commission {
        use super::*;

        #[test]
        fn percentage_of_notional() {
            let config = ExecutionConfig {
                commission_pct: 0.1,
                ..ExecutionConfig::default()
            };
            assert_relative_eq!(calculate_commission(10_000.0, &config), 10.0);
        }

        #[test]
        fn zero_by_default() {
            assert_relative_eq!(
                calculate_commission(10_000.0, &ExecutionConfig::default()),
                0.0
            );
        }
    }

    mod fills {
        use super::*;

        #[test]
        fn enter_long_sizes_from_cash() {
            let mut portfolio = Portfolio::new(10_000.0);
            let result = enter_long(&mut portfolio, &bar_at(100.0), &ExecutionConfig::default());
            let EntryResult::Filled(fill) = result else {
                panic!("expected fill");
            };
            assert_relative_eq!(fill.size, 90.0);
            assert_relative_eq!(fill.price, 100.0);
            assert_relative_eq!(portfolio.cash, 1_000.0);
        }

        #[test]
        fn enter_long_fractional_size() {
            let mut portfolio = Portfolio::new(1_000.0);
            let EntryResult::Filled(fill) =
                enter_long(&mut portfolio, &bar_at(300.0), &ExecutionConfig::default())
            else {
                panic!("expected fill");
            };
            assert_relative_eq!(fill.size, 3.0);
        }

        #[test]
        fn enter_long_rejected_when_commission_unaffordable() {
            let mut portfolio = Portfolio::new(1_000.0);
            let config = ExecutionConfig {
                position_pct: 100.0,
                commission_pct: 1.0,
            };
            assert_eq!(
                enter_long(&mut portfolio, &bar_at(10.0), &config),
                EntryResult::Rejected
            );
            assert_relative_eq!(portfolio.cash, 1_000.0);
            assert!(!portfolio.has_holding());
        }

        #[test]
        fn exit_long_returns_proceeds() {
            let mut portfolio = Portfolio::new(10_000.0);
            let config = ExecutionConfig {
                position_pct: 50.0,
                commission_pct: 1.0,
            };
            enter_long(&mut portfolio, &bar_at(100.0), &config);
            assert_relative_eq!(portfolio.cash, 10_000.0 - 5_000.0 - 50.0);
            let fill = exit_long(&mut portfolio, &bar_at(110.0), &config).unwrap();
            assert_relative_eq!(fill.commission, 55.0);
            assert_relative_eq!(portfolio.cash, 4_950.0 + 5_500.0 - 55.0);
        }

        #[test]
        fn exit_without_holding_is_engine_error() {
            let mut portfolio = Portfolio::new(10_000.0);
            let err = exit_long(&mut portfolio, &bar_at(100.0), &ExecutionConfig::default())
                .unwrap_err();
            assert!(matches!(err, BacktestError::Engine { .. }));
        }
    }

    mod run {
        use super::*;

        fn donchian() -> StrategyParams {
            StrategyParams::Donchian { period: 3 }
        }

        #[test]
        fn empty_series_keeps_initial_cash() {
            let run = run_strategy(
                &[],
                &donchian(),
                5_000.0,
                &ExecutionConfig::default(),
                &CancelToken::new(),
            )
            .unwrap();
            assert!(run.closed_trades.is_empty());
            assert!(run.equity_curve.is_empty());
            assert_relative_eq!(run.final_value, 5_000.0);
        }

        #[test]
        fn decision_fills_at_next_open() {
            // Breakout on bar 3, breakdown on bar 6.
            let closes = [10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 5.0, 5.0, 5.0];
            let bars = bars_from(&closes);
            let run = run_strategy(
                &bars,
                &donchian(),
                1_000.0,
                &ExecutionConfig::default(),
                &CancelToken::new(),
            )
            .unwrap();
            assert_eq!(run.closed_trades.len(), 1);
            let trade = &run.closed_trades[0];
            assert_eq!(trade.entry_time, bars[4].time);
            assert_relative_eq!(trade.entry_price, bars[4].open);
            assert_eq!(trade.exit_time, bars[7].time);
            assert_relative_eq!(trade.exit_price, bars[7].open);
            assert_relative_eq!(trade.size, 900.0 / 20.5);
            assert_relative_eq!(
                trade.pnl_net,
                trade.size * (5.5 - 20.5),
                epsilon = 1e-9
            );
            assert_relative_eq!(run.final_value, 1_000.0 + trade.pnl_net, epsilon = 1e-9);
            assert_eq!(run.equity_curve.len(), bars.len());
        }

        #[test]
        fn open_position_is_marked_not_reported() {
            let closes = [10.0, 10.0, 10.0, 20.0, 21.0, 22.0];
            let bars = bars_from(&closes);
            let run = run_strategy(
                &bars,
                &donchian(),
                1_000.0,
                &ExecutionConfig::default(),
                &CancelToken::new(),
            )
            .unwrap();
            assert!(run.closed_trades.is_empty());
            let size = 900.0 / 21.5;
            assert_relative_eq!(run.final_value, 100.0 + size * 22.0, epsilon = 1e-9);
        }

        #[test]
        fn invalid_price_is_engine_error() {
            let mut bars = bars_from(&[10.0, 11.0, 12.0]);
            bars[1].low = f64::NAN;
            let err = run_strategy(
                &bars,
                &donchian(),
                1_000.0,
                &ExecutionConfig::default(),
                &CancelToken::new(),
            )
            .unwrap_err();
            assert!(matches!(err, BacktestError::Engine { .. }));
            assert!(err.to_string().contains("bar 1"));
        }

        #[test]
        fn cancelled_before_start() {
            let cancel = CancelToken::new();
            cancel.cancel();
            let err = run_strategy(
                &bars_from(&[10.0; 10]),
                &donchian(),
                1_000.0,
                &ExecutionConfig::default(),
                &cancel,
            )
            .unwrap_err();
            assert!(matches!(err, BacktestError::Cancelled));
        }
    }
}
