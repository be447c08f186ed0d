//! Risk metrics derived from the per-bar equity curve.
//!
//! Ratios are annualised with the timeframe's bars-per-year and use a zero
//! risk-free rate. A ratio whose denominator is zero is `None`.

use super::portfolio::EquityPoint;
use super::timeframe::Timeframe;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    pub total_return_pct: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Largest peak-to-trough decline, in percent of the peak.
    pub max_drawdown_pct: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_bars: usize,
    pub annual_volatility_pct: f64,
    pub cagr_pct: Option<f64>,
}

impl RiskMetrics {
    pub fn compute(equity_curve: &[EquityPoint], initial_cash: f64, timeframe: Timeframe) -> Self {
        let final_equity = equity_curve.last().map_or(initial_cash, |p| p.equity);
        let total_return_pct = if initial_cash > 0.0 {
            (final_equity - initial_cash) / initial_cash * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_bars) = compute_drawdown(equity_curve);
        let returns = bar_returns(equity_curve);
        let periods = timeframe.periods_per_year();
        let (sharpe_ratio, sortino_ratio, volatility) = compute_risk_adjusted(&returns, periods);

        RiskMetrics {
            total_return_pct,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_pct: max_drawdown * 100.0,
            max_drawdown_bars,
            annual_volatility_pct: volatility * 100.0,
            cagr_pct: compute_cagr(equity_curve, initial_cash).map(|c| c * 100.0),
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// (sharpe, sortino, annualised volatility as a fraction).
fn compute_risk_adjusted(
    returns: &[f64],
    periods_per_year: f64,
) -> (Option<f64>, Option<f64>, f64) {
    if returns.len() < 2 {
        return (None, None, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let annualiser = periods_per_year.sqrt();

    let sharpe = (stddev > 0.0).then(|| mean / stddev * annualiser);

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside = downside_variance.sqrt();
    let sortino = (downside > 0.0).then(|| mean / downside * annualiser);

    (sharpe, sortino, stddev * annualiser)
}

fn compute_cagr(equity_curve: &[EquityPoint], initial_cash: f64) -> Option<f64> {
    let first = equity_curve.first()?;
    let last = equity_curve.last()?;
    let days = (last.time - first.time).num_seconds() as f64 / 86_400.0;
    if days <= 0.0 || initial_cash <= 0.0 || last.equity <= 0.0 {
        return None;
    }
    let years = days / DAYS_PER_YEAR;
    Some((last.equity / initial_cash).powf(1.0 / years) - 1.0)
}
