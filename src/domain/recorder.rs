//! Per-run trade event recorder.
//!
//! Tracks whether the strategy is flat, long or waiting on an order, keeps
//! the single open trade separate from the closed-trade list, and turns fill
//! notifications into closed [`Trade`]s.

use log::{debug, warn};

use crate::domain::error::BacktestError;
use crate::domain::position::{Fill, OpenTrade, OrderSide, Trade};
use crate::domain::strategy::PositionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Flat,
    Long,
    OrderPending(OrderSide),
}

#[derive(Debug, Clone, Default)]
pub struct TradeRecorder {
    pending: Option<OrderSide>,
    open_trade: Option<OpenTrade>,
    closed: Vec<Trade>,
    ignored_fills: usize,
}

impl TradeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        match (self.pending, &self.open_trade) {
            (Some(side), _) => RecorderState::OrderPending(side),
            (None, Some(_)) => RecorderState::Long,
            (None, None) => RecorderState::Flat,
        }
    }

    /// Position as seen by the decision rules.
    pub fn position_state(&self) -> PositionState {
        if self.open_trade.is_some() {
            PositionState::Long
        } else {
            PositionState::Flat
        }
    }

    pub fn pending_side(&self) -> Option<OrderSide> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn open_trade(&self) -> Option<&OpenTrade> {
        self.open_trade.as_ref()
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed
    }

    pub fn ignored_fills(&self) -> usize {
        self.ignored_fills
    }

    /// Register a new market order. Buys only from Flat, sells only from Long,
    /// never while another order is outstanding.
    pub fn submit(&mut self, side: OrderSide) -> Result<(), BacktestError> {
        match (self.state(), side) {
            (RecorderState::OrderPending(current), _) => Err(BacktestError::engine(format!(
                "cannot submit a {} order while a {} order is pending",
                side, current
            ))),
            (RecorderState::Flat, OrderSide::Buy) | (RecorderState::Long, OrderSide::Sell) => {
                self.pending = Some(side);
                Ok(())
            }
            (RecorderState::Flat, OrderSide::Sell) => Err(BacktestError::engine(
                "cannot submit a sell order without an open position",
            )),
            (RecorderState::Long, OrderSide::Buy) => Err(BacktestError::engine(
                "cannot submit a buy order while already long",
            )),
        }
    }

    /// The pending order was not executed; return to the prior state.
    pub fn on_rejected(&mut self) {
        if let Some(side) = self.pending.take() {
            debug!("{} order rejected", side);
        }
    }

    /// Apply a fill notification. Fills that match no trade leg are dropped.
    pub fn on_fill(&mut self, fill: &Fill) {
        match (fill.side, self.open_trade.take()) {
            (OrderSide::Buy, None) => {
                debug!(
                    "buy filled at {} size {:.4} on {}",
                    fill.price, fill.size, fill.time
                );
                self.open_trade = Some(OpenTrade::from_fill(fill));
            }
            (OrderSide::Sell, Some(open)) => {
                let trade = open.close(fill);
                debug!(
                    "sell filled at {} on {}, net pnl {:.2}",
                    fill.price, fill.time, trade.pnl_net
                );
                self.closed.push(trade);
            }
            (side, open) => {
                self.open_trade = open;
                self.ignored_fills += 1;
                warn!(
                    "ignoring unexpected {} fill at {} on {} (open trade: {})",
                    side,
                    fill.price,
                    fill.time,
                    self.open_trade.is_some()
                );
                return;
            }
        }
        if self.pending == Some(fill.side) {
            self.pending = None;
        }
    }

    pub fn into_closed_trades(self) -> Vec<Trade> {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn fill(side: OrderSide, day: u32, price: f64) -> Fill {
        Fill {
            side,
            time: at(day),
            price,
            size: 2.0,
            commission: 0.0,
        }
    }

    #[test]
    fn full_round_trip() {
        let mut rec = TradeRecorder::new();
        assert_eq!(rec.state(), RecorderState::Flat);

        rec.submit(OrderSide::Buy).unwrap();
        assert_eq!(rec.state(), RecorderState::OrderPending(OrderSide::Buy));
        assert_eq!(rec.position_state(), PositionState::Flat);

        rec.on_fill(&fill(OrderSide::Buy, 2, 10.0));
        assert_eq!(rec.state(), RecorderState::Long);
        assert!(rec.open_trade().is_some());
        assert!(rec.closed_trades().is_empty());

        rec.submit(OrderSide::Sell).unwrap();
        assert_eq!(rec.state(), RecorderState::OrderPending(OrderSide::Sell));
        assert_eq!(rec.position_state(), PositionState::Long);

        rec.on_fill(&fill(OrderSide::Sell, 5, 12.0));
        assert_eq!(rec.state(), RecorderState::Flat);
        assert!(rec.open_trade().is_none());
        assert_eq!(rec.closed_trades().len(), 1);
        assert_eq!(rec.closed_trades()[0].pnl_net, 4.0);
    }

    #[test]
    fn submit_while_pending_is_engine_error() {
        let mut rec = TradeRecorder::new();
        rec.submit(OrderSide::Buy).unwrap();
        let err = rec.submit(OrderSide::Buy).unwrap_err();
        assert!(matches!(err, BacktestError::Engine { .. }));
    }

    #[test]
    fn submit_must_match_position() {
        let mut rec = TradeRecorder::new();
        assert!(rec.submit(OrderSide::Sell).is_err());
        rec.submit(OrderSide::Buy).unwrap();
        rec.on_fill(&fill(OrderSide::Buy, 1, 10.0));
        assert!(rec.submit(OrderSide::Buy).is_err());
    }

    #[test]
    fn rejected_buy_returns_to_flat() {
        let mut rec = TradeRecorder::new();
        rec.submit(OrderSide::Buy).unwrap();
        rec.on_rejected();
        assert_eq!(rec.state(), RecorderState::Flat);
        assert!(rec.submit(OrderSide::Buy).is_ok());
    }

    #[test]
    fn rejected_sell_stays_long() {
        let mut rec = TradeRecorder::new();
        rec.submit(OrderSide::Buy).unwrap();
        rec.on_fill(&fill(OrderSide::Buy, 1, 10.0));
        rec.submit(OrderSide::Sell).unwrap();
        rec.on_rejected();
        assert_eq!(rec.state(), RecorderState::Long);
    }

    #[test]
    fn sell_fill_without_open_trade_is_ignored() {
        let mut rec = TradeRecorder::new();
        rec.on_fill(&fill(OrderSide::Sell, 3, 11.0));
        assert_eq!(rec.state(), RecorderState::Flat);
        assert!(rec.closed_trades().is_empty());
        assert_eq!(rec.ignored_fills(), 1);
    }

    #[test]
    fn buy_fill_while_long_is_ignored() {
        let mut rec = TradeRecorder::new();
        rec.submit(OrderSide::Buy).unwrap();
        rec.on_fill(&fill(OrderSide::Buy, 1, 10.0));
        rec.on_fill(&fill(OrderSide::Buy, 2, 99.0));
        assert_eq!(rec.ignored_fills(), 1);
        assert_eq!(rec.open_trade().unwrap().entry_price, 10.0);
    }

    #[test]
    fn ignored_fill_keeps_order_pending() {
        let mut rec = TradeRecorder::new();
        rec.submit(OrderSide::Buy).unwrap();
        rec.on_fill(&fill(OrderSide::Sell, 1, 10.0));
        assert_eq!(rec.state(), RecorderState::OrderPending(OrderSide::Buy));
    }

    #[test]
    fn at_most_one_open_trade() {
        let mut rec = TradeRecorder::new();
        for day in 1..=5 {
            rec.submit(OrderSide::Buy).unwrap();
            rec.on_fill(&fill(OrderSide::Buy, day, 10.0));
            rec.submit(OrderSide::Sell).unwrap();
            rec.on_fill(&fill(OrderSide::Sell, day + 1, 11.0));
        }
        assert!(rec.open_trade().is_none());
        assert_eq!(rec.into_closed_trades().len(), 5);
    }
}
