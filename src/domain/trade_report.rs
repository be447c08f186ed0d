//! Trade post-processing: numbering, running balance, statistics and the
//! flat rows used for tabular export.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::execution::CANCEL_POLL_INTERVAL;
use crate::domain::position::Trade;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrade {
    /// 1-based position in close order.
    pub number: usize,
    pub trade: Trade,
    /// Initial cash plus the net P&L of this and every earlier trade.
    pub running_balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub max_profit_trade: f64,
    /// Magnitude of the worst single loss, never negative.
    pub max_loss_trade: f64,
    pub pnl_net: f64,
}

impl TradeStatistics {
    pub fn win_rate(&self) -> Option<f64> {
        if self.total_trades == 0 {
            None
        } else {
            Some(self.winning_trades as f64 / self.total_trades as f64 * 100.0)
        }
    }
}

/// Single pass over closed trades in close order.
pub fn process_trades(
    trades: &[Trade],
    initial_cash: f64,
    cancel: &CancelToken,
) -> Result<(Vec<ProcessedTrade>, TradeStatistics), BacktestError> {
    let mut processed = Vec::with_capacity(trades.len());
    let mut stats = TradeStatistics::default();
    let mut balance = initial_cash;

    for (i, trade) in trades.iter().enumerate() {
        if i % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }

        let pnl = trade.pnl_net;
        stats.total_trades += 1;
        if pnl > 0.0 {
            stats.winning_trades += 1;
            stats.max_profit_trade = stats.max_profit_trade.max(pnl);
        } else if pnl < 0.0 {
            stats.losing_trades += 1;
            stats.max_loss_trade = stats.max_loss_trade.max(-pnl);
        }
        stats.pnl_net += pnl;

        balance += pnl;
        processed.push(ProcessedTrade {
            number: i + 1,
            trade: trade.clone(),
            running_balance: balance,
        });
    }

    Ok((processed, stats))
}

/// Date format for report cells: minutes matter only for intraday bars.
pub fn format_time(time: NaiveDateTime, timeframe: Timeframe) -> String {
    if timeframe.is_intraday() {
        time.format("%Y-%m-%d %H:%M").to_string()
    } else {
        time.format("%Y-%m-%d").to_string()
    }
}

/// One exported row. Numeric cells are pre-formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRow {
    #[serde(rename = "#")]
    pub number: usize,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Type")]
    pub trade_type: String,
    #[serde(rename = "Date In")]
    pub date_in: String,
    #[serde(rename = "Price In")]
    pub price_in: String,
    #[serde(rename = "Date Out")]
    pub date_out: String,
    #[serde(rename = "Price Out")]
    pub price_out: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "P/L (Net)")]
    pub pnl_net: String,
    #[serde(rename = "Balance")]
    pub balance: String,
}

pub const EXPORT_HEADERS: [&str; 10] = [
    "#",
    "Symbol",
    "Type",
    "Date In",
    "Price In",
    "Date Out",
    "Price Out",
    "Size",
    "P/L (Net)",
    "Balance",
];

pub fn export_rows(symbol: &str, trades: &[ProcessedTrade], timeframe: Timeframe) -> Vec<TradeRow> {
    trades
        .iter()
        .map(|p| TradeRow {
            number: p.number,
            symbol: symbol.to_string(),
            trade_type: p.trade.trade_type.to_string(),
            date_in: format_time(p.trade.entry_time, timeframe),
            price_in: format!("{:.2}", p.trade.entry_price),
            date_out: format_time(p.trade.exit_time, timeframe),
            price_out: format!("{:.2}", p.trade.exit_price),
            size: format!("{:.4}", p.trade.size),
            pnl_net: format!("{:.2}", p.trade.pnl_net),
            balance: format!("{:.2}", p.running_balance),
        })
        .collect()
}
