//! CSV file data adapter.
//!
//! Reads `{base_path}/{SYMBOL}_{timeframe}.csv`, e.g. `AAPL_1d.csv`. Headers
//! are matched case-insensitively; the time column may be called `date`,
//! `datetime`, `time` or `timestamp` and holds either a date or a date-time.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::{DataPort, FetchLimits, FetchRequest};

const TIME_COLUMNS: [&str; 4] = ["date", "datetime", "time", "timestamp"];
const PRICE_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
const ROW_POLL_INTERVAL: usize = 256;

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from the header row.
struct ColumnMap {
    time: usize,
    prices: [usize; 5],
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol, timeframe.code()))
    }
}

fn resolve_columns(headers: &csv::StringRecord, symbol: &str) -> Result<ColumnMap, BacktestError> {
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let time = TIME_COLUMNS.iter().find_map(|&c| position(c));
    let mut missing: Vec<&str> = Vec::new();
    if time.is_none() {
        missing.push("Date");
    }
    let mut prices = [0usize; 5];
    for (slot, name) in prices.iter_mut().zip(PRICE_COLUMNS) {
        match position(name) {
            Some(idx) => *slot = idx,
            None => missing.push(name),
        }
    }

    match time {
        Some(time) if missing.is_empty() => Ok(ColumnMap { time, prices }),
        _ => Err(BacktestError::data_unavailable(
            symbol,
            format!("Data for {} missing columns: {}.", symbol, missing.join(", ")),
        )),
    }
}

fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_field(
    record: &csv::StringRecord,
    idx: usize,
    column: &str,
    symbol: &str,
    line: usize,
) -> Result<f64, BacktestError> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| {
        BacktestError::data_unavailable(
            symbol,
            format!(
                "Data for {} has an invalid {} value '{}' on line {}.",
                symbol, column, raw, line
            ),
        )
    })
}

impl DataPort for CsvAdapter {
    fn source_name(&self) -> &str {
        "csv"
    }

    fn fetch_ohlcv(
        &self,
        request: &FetchRequest,
        limits: &FetchLimits,
        cancel: &CancelToken,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        let symbol = request.symbol.as_str();
        let path = self.csv_path(symbol, request.timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No data file at {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let started = Instant::now();
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| {
                BacktestError::data_unavailable(symbol, format!("CSV parse error: {}", e))
            })?
            .clone();
        let columns = resolve_columns(&headers, symbol)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            if row % ROW_POLL_INTERVAL == 0 {
                cancel.check()?;
                limits.check_deadline(symbol, started)?;
            }
            let record = result.map_err(|e| {
                BacktestError::data_unavailable(symbol, format!("CSV parse error: {}", e))
            })?;
            let line = row + 2;

            let raw_time = record.get(columns.time).unwrap_or("");
            let time = parse_time(raw_time).ok_or_else(|| {
                BacktestError::data_unavailable(
                    symbol,
                    format!(
                        "Data for {} has an invalid date '{}' on line {}.",
                        symbol, raw_time, line
                    ),
                )
            })?;
            if time.date() < request.start || time.date() > request.end {
                continue;
            }

            let [open, high, low, close, volume] = columns.prices;
            bars.push(OhlcvBar {
                time,
                open: parse_field(&record, open, "Open", symbol, line)?,
                high: parse_field(&record, high, "High", symbol, line)?,
                low: parse_field(&record, low, "Low", symbol, line)?,
                close: parse_field(&record, close, "Close", symbol, line)?,
                volume: parse_field(&record, volume, "Volume", symbol, line)?,
            });
            limits.check_bar_count(symbol, bars.len())?;
        }

        bars.sort_by_key(|b| b.time);
        debug!("Read {} bars from {}", bars.len(), path.display());
        Ok(bars)
    }
}
