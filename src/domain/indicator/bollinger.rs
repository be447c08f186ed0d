//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (devfactor × StdDev)
//! - Lower: Middle - (devfactor × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(bars: &[OhlcvBar], period: usize, devfactor: f64) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100: (devfactor * 100.0).round().max(0.0) as u32,
    };
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                time: bar.time,
                valid: false,
                value: IndicatorValue::Bollinger {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            });
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let middle = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|b| {
                let diff = b.close - middle;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        values.push(IndicatorPoint {
            time: bar.time,
            valid: true,
            value: IndicatorValue::Bollinger {
                upper: middle + devfactor * stddev,
                middle,
                lower: middle - devfactor * stddev,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use approx::assert_relative_eq;

    fn bands(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.valid_at(i) {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (*upper, *middle, *lower),
            other => panic!("expected valid bands at {}, got {:?}", i, other),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&from_closes(&[1.0, 2.0, 3.0, 4.0]), 3, 2.0);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn bollinger_population_stddev() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population stddev 2.
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let series = calculate_bollinger(&from_closes(&closes), 8, 2.0);
        let (upper, middle, lower) = bands(&series, 7);
        assert_relative_eq!(middle, 5.0);
        assert_relative_eq!(upper, 9.0);
        assert_relative_eq!(lower, 1.0);
    }

    #[test]
    fn bollinger_flat_series_collapses() {
        let series = calculate_bollinger(&from_closes(&[10.0; 5]), 5, 2.0);
        let (upper, middle, lower) = bands(&series, 4);
        assert_relative_eq!(upper, 10.0);
        assert_relative_eq!(middle, 10.0);
        assert_relative_eq!(lower, 10.0);
    }

    #[test]
    fn bollinger_fractional_devfactor_in_type() {
        let series = calculate_bollinger(&from_closes(&[1.0]), 20, 1.5);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 150,
            }
        );
    }
}
