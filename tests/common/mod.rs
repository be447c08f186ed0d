#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use blindquants::domain::cancel::CancelToken;
use blindquants::domain::error::BacktestError;
pub use blindquants::domain::ohlcv::OhlcvBar;
use blindquants::domain::timeframe::Timeframe;
use blindquants::ports::data_port::{DataPort, FetchLimits, FetchRequest};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// In-memory data port that records how often it was asked for data.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl DataPort for MockDataPort {
    fn source_name(&self) -> &str {
        "mock"
    }

    fn fetch_ohlcv(
        &self,
        request: &FetchRequest,
        _limits: &FetchLimits,
        cancel: &CancelToken,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        self.fetches.set(self.fetches.get() + 1);
        cancel.check()?;
        if let Some(reason) = self.errors.get(&request.symbol) {
            return Err(BacktestError::data_unavailable(&request.symbol, reason.clone()));
        }
        Ok(self
            .data
            .get(&request.symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() >= request.start && b.date() <= request.end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).unwrap()
}

/// Bar whose open sits a quarter above its close.
pub fn make_bar(time: NaiveDateTime, close: f64) -> OhlcvBar {
    let open = close + 0.25;
    OhlcvBar {
        time,
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1_000.0,
    }
}

/// One bar per calendar day starting at `start`.
pub fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(midnight(start) + Duration::days(i as i64), c))
        .collect()
}

/// First day of the SMA cross scenario.
pub const SCENARIO_START: (i32, u32, u32) = (2023, 1, 1);

/// 300 daily closes: flat at 100 for bars 0..=49, rising by one per bar
/// through bar 119, then collapsing to 10 from bar 120 on. SMA(10)/SMA(30)
/// crosses up on bar 50 and down on bar 120.
pub fn sma_scenario_closes() -> Vec<f64> {
    (0..300)
        .map(|i| match i {
            0..=49 => 100.0,
            50..=119 => 100.0 + (i - 49) as f64,
            _ => 10.0,
        })
        .collect()
}

pub fn sma_scenario_bars() -> Vec<OhlcvBar> {
    let (y, m, d) = SCENARIO_START;
    daily_bars(date(y, m, d), &sma_scenario_closes())
}

/// Oscillating closes that trigger every strategy a few times.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 20.0 * (t / 9.0).sin() + 5.0 * (t / 3.0).cos()
        })
        .collect()
}

/// Write bars as `{dir}/{symbol}_{tf}.csv` in the layout the CSV adapter reads.
pub fn write_csv(dir: &Path, symbol: &str, timeframe: Timeframe, bars: &[OhlcvBar]) {
    let mut content = String::from("Date,Open,High,Low,Close,Volume\n");
    for b in bars {
        let time = if timeframe.is_intraday() {
            b.time.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            b.time.format("%Y-%m-%d").to_string()
        };
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            time, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{}_{}.csv", symbol, timeframe.code())), content).unwrap();
}
