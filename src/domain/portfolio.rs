//! Cash, the single holding and equity tracking.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub size: f64,
    pub entry_price: f64,
}

impl Holding {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub holding: Option<Holding>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            holding: None,
            equity_curve: Vec::new(),
        }
    }

    pub fn has_holding(&self) -> bool {
        self.holding.is_some()
    }

    /// Cash plus the holding valued at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .holding
                .as_ref()
                .map_or(0.0, |h| h.market_value(price))
    }

    pub fn record_equity(&mut self, time: NaiveDateTime, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { time, equity });
    }

    /// Last marked equity, or the starting cash before any bar.
    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_cash, |p| p.equity)
    }
}
