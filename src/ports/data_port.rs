//! Market data access port.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

/// One OHLCV download. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timeframe: Timeframe,
}

/// Bounds every fetch must honour.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bars: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        FetchLimits {
            timeout: Duration::from_secs(30),
            max_bars: 100_000,
        }
    }
}

impl FetchLimits {
    pub fn check_bar_count(&self, symbol: &str, bars: usize) -> Result<(), BacktestError> {
        if bars > self.max_bars {
            return Err(BacktestError::data_unavailable(
                symbol,
                format!(
                    "Data for {} exceeds the limit of {} bars ({} returned). Narrow the date range.",
                    symbol, self.max_bars, bars
                ),
            ));
        }
        Ok(())
    }

    pub fn check_deadline(&self, symbol: &str, started: Instant) -> Result<(), BacktestError> {
        if started.elapsed() > self.timeout {
            return Err(BacktestError::data_unavailable(
                symbol,
                format!(
                    "Fetching data for {} timed out after {} seconds.",
                    symbol,
                    self.timeout.as_secs()
                ),
            ));
        }
        Ok(())
    }
}

pub trait DataPort {
    /// Short name of the backing source, used in logs.
    fn source_name(&self) -> &str;

    /// Bars for `request` in chronological order. Implementations return
    /// `DataUnavailable` for missing data or columns and when `limits` are
    /// exceeded, and `Cancelled` once `cancel` fires.
    fn fetch_ohlcv(
        &self,
        request: &FetchRequest,
        limits: &FetchLimits,
        cancel: &CancelToken,
    ) -> Result<Vec<OhlcvBar>, BacktestError>;
}
