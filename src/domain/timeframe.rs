//! Bar sampling intervals and the upstream data-availability windows.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    Hourly,
    ThirtyMinute,
    FifteenMinute,
    FiveMinute,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
        Timeframe::Hourly,
        Timeframe::ThirtyMinute,
        Timeframe::FifteenMinute,
        Timeframe::FiveMinute,
    ];

    /// Interval code as used by the data provider (`1d`, `1h`, `5m`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::Daily => "1d",
            Timeframe::Weekly => "1wk",
            Timeframe::Monthly => "1mo",
            Timeframe::Hourly => "1h",
            Timeframe::ThirtyMinute => "30m",
            Timeframe::FifteenMinute => "15m",
            Timeframe::FiveMinute => "5m",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily (1d)",
            Timeframe::Weekly => "Weekly (1wk)",
            Timeframe::Monthly => "Monthly (1mo)",
            Timeframe::Hourly => "Hourly (1h)",
            Timeframe::ThirtyMinute => "30 Minutes (30m)",
            Timeframe::FifteenMinute => "15 Minutes (15m)",
            Timeframe::FiveMinute => "5 Minutes (5m)",
        }
    }

    /// Maximum lookback window in days, `None` when the provider keeps full history.
    pub fn max_lookback_days(&self) -> Option<i64> {
        match self {
            Timeframe::FiveMinute | Timeframe::FifteenMinute | Timeframe::ThirtyMinute => Some(59),
            Timeframe::Hourly => Some(729),
            Timeframe::Daily | Timeframe::Weekly | Timeframe::Monthly => None,
        }
    }

    /// Human wording of the lookback window used in validation messages.
    pub fn lookback_label(&self) -> &'static str {
        match self.max_lookback_days() {
            Some(59) => "~60 days",
            Some(_) => "~2 years",
            None => "unlimited history",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Timeframe::Hourly
                | Timeframe::ThirtyMinute
                | Timeframe::FifteenMinute
                | Timeframe::FiveMinute
        )
    }

    /// Bars per year used to annualise per-bar returns.
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Timeframe::Daily => 252.0,
            Timeframe::Weekly => 52.0,
            Timeframe::Monthly => 12.0,
            Timeframe::Hourly => 252.0 * 7.0,
            Timeframe::ThirtyMinute => 252.0 * 13.0,
            Timeframe::FifteenMinute => 252.0 * 26.0,
            Timeframe::FiveMinute => 252.0 * 78.0,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown timeframe '{0}' (expected one of 1d, 1wk, 1mo, 1h, 30m, 15m, 5m)")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.code() == needle)
            .ok_or_else(|| UnknownTimeframe(s.trim().to_string()))
    }
}
