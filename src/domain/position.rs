//! Orders, fills and trade records.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Long,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Long => f.write_str("Long"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

/// An executed market order as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub side: OrderSide,
    pub time: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub commission: f64,
}

/// Entry leg of a trade whose exit has not filled yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub trade_type: TradeType,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub size: f64,
    pub entry_commission: f64,
}

impl OpenTrade {
    pub fn from_fill(fill: &Fill) -> Self {
        OpenTrade {
            trade_type: TradeType::Long,
            entry_time: fill.time,
            entry_price: fill.price,
            size: fill.size,
            entry_commission: fill.commission,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.entry_price)
    }

    /// Close against an exit fill. Net P&L deducts both commissions.
    pub fn close(self, exit: &Fill) -> Trade {
        let gross = self.size * (exit.price - self.entry_price);
        Trade {
            trade_type: self.trade_type,
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            size: self.size,
            exit_time: exit.time,
            exit_price: exit.price,
            pnl_net: gross - self.entry_commission - exit.commission,
        }
    }
}

/// A round trip with both legs filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub trade_type: TradeType,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub size: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub pnl_net: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl_net > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl_net < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn fill(side: OrderSide, day: u32, price: f64, commission: f64) -> Fill {
        Fill {
            side,
            time: at(day),
            price,
            size: 10.0,
            commission,
        }
    }

    #[test]
    fn close_computes_net_pnl() {
        let open = OpenTrade::from_fill(&fill(OrderSide::Buy, 2, 50.0, 1.5));
        let trade = open.close(&fill(OrderSide::Sell, 9, 60.0, 2.0));
        assert_eq!(trade.entry_time, at(2));
        assert_eq!(trade.exit_time, at(9));
        assert_relative_eq!(trade.pnl_net, 100.0 - 3.5);
        assert!(trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn losing_trade() {
        let open = OpenTrade::from_fill(&fill(OrderSide::Buy, 2, 50.0, 0.0));
        let trade = open.close(&fill(OrderSide::Sell, 3, 45.0, 0.0));
        assert_relative_eq!(trade.pnl_net, -50.0);
        assert!(trade.is_loss());
    }

    #[test]
    fn break_even_is_neither_win_nor_loss() {
        let open = OpenTrade::from_fill(&fill(OrderSide::Buy, 2, 50.0, 0.0));
        let trade = open.close(&fill(OrderSide::Sell, 3, 50.0, 0.0));
        assert!(!trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn unrealized_pnl() {
        let open = OpenTrade::from_fill(&fill(OrderSide::Buy, 2, 50.0, 0.0));
        assert_relative_eq!(open.unrealized_pnl(55.0), 50.0);
    }

    #[test]
    fn trade_type_display() {
        assert_eq!(TradeType::Long.to_string(), "Long");
        assert_eq!(OrderSide::Sell.to_string(), "sell");
    }
}
