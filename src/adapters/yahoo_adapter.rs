//! Yahoo Finance chart API adapter.
//!
//! Blocking client over the v8 chart endpoint. Each request carries the
//! fetch timeout; rows where Yahoo reports no prices are dropped.

use chrono::{DateTime, NaiveDate};
use log::{debug, info};
use serde::Deserialize;

use crate::domain::cancel::CancelToken;
use crate::domain::error::BacktestError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{DataPort, FetchLimits, FetchRequest};

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new() -> Result<Self, BacktestError> {
        Self::with_base_url(CHART_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, BacktestError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BacktestError::engine(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Chart URL covering `start..=end`; `period2` is exclusive on Yahoo's side.
    fn chart_url(&self, request: &FetchRequest) -> String {
        let start_ts = day_start_timestamp(request.start);
        let end_ts = request
            .end
            .succ_opt()
            .map(day_start_timestamp)
            .unwrap_or_else(|| day_start_timestamp(request.end));
        format!(
            "{}/{}?period1={}&period2={}&interval={}&includePrePost=false",
            self.base_url,
            request.symbol,
            start_ts,
            end_ts,
            request.timeframe.code()
        )
    }
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Columns Yahoo left out entirely, in display order.
fn missing_columns(quote: &QuoteData) -> Vec<&'static str> {
    [
        ("Open", &quote.open),
        ("High", &quote.high),
        ("Low", &quote.low),
        ("Close", &quote.close),
        ("Volume", &quote.volume),
    ]
    .into_iter()
    .filter(|(_, column)| column.is_empty())
    .map(|(name, _)| name)
    .collect()
}

fn check_columns(quote: &QuoteData, symbol: &str) -> Result<(), BacktestError> {
    let missing = missing_columns(quote);
    if missing.is_empty() {
        return Ok(());
    }
    Err(BacktestError::data_unavailable(
        symbol,
        format!("Data for {} missing columns: {}.", symbol, missing.join(", ")),
    ))
}

fn parse_response(
    request: &FetchRequest,
    body: &str,
    limits: &FetchLimits,
) -> Result<Vec<OhlcvBar>, BacktestError> {
    let symbol = request.symbol.as_str();
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| {
        BacktestError::data_unavailable(
            symbol,
            format!("Unexpected response for {}: {}", symbol, e),
        )
    })?;

    let data = match (response.chart.result, response.chart.error) {
        (Some(result), _) => result.into_iter().next(),
        (None, Some(err)) => {
            return Err(BacktestError::data_unavailable(
                symbol,
                format!("Yahoo error for {}: {} ({})", symbol, err.description, err.code),
            ));
        }
        (None, None) => None,
    };
    let Some(data) = data else {
        return Ok(Vec::new());
    };
    let timestamps = data.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Ok(Vec::new());
    }
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();
    check_columns(&quote, symbol)?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(time) = DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc()) else {
            continue;
        };
        if time.date() < request.start || time.date() > request.end {
            continue;
        }
        let at = |column: &[Option<f64>]| column.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open),
            at(&quote.high),
            at(&quote.low),
            at(&quote.close),
        ) else {
            continue;
        };
        bars.push(OhlcvBar {
            time,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
        limits.check_bar_count(symbol, bars.len())?;
    }
    bars.sort_by_key(|b| b.time);
    Ok(bars)
}

impl DataPort for YahooAdapter {
    fn source_name(&self) -> &str {
        "yahoo"
    }

    fn fetch_ohlcv(
        &self,
        request: &FetchRequest,
        limits: &FetchLimits,
        cancel: &CancelToken,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        cancel.check()?;
        let symbol = request.symbol.as_str();
        let url = self.chart_url(request);
        info!("Fetching {} {} from Yahoo", symbol, request.timeframe);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(limits.timeout)
            .send()
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!(
                        "Fetching data for {} timed out after {} seconds.",
                        symbol,
                        limits.timeout.as_secs()
                    )
                } else {
                    format!("Failed to fetch data for {}: {}", symbol, e)
                };
                BacktestError::data_unavailable(symbol, reason)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(BacktestError::data_unavailable(
                symbol,
                format!("Failed to fetch data for {}: HTTP {}", symbol, status),
            ));
        }
        let body = response.text().map_err(|e| {
            BacktestError::data_unavailable(
                symbol,
                format!("Failed to read response for {}: {}", symbol, e),
            )
        })?;
        cancel.check()?;
        parse_response(request, &body, limits)
    }
}
