//! Donchian channel over the bars preceding the current one.
//!
//! upper = highest high and lower = lowest low of bars [i-n, i-1], so a close
//! can break out of the channel it is compared against. Warmup: first n bars
//! are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_donchian(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Donchian(period),
            values: Vec::new(),
        };
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                return IndicatorPoint {
                    time: bar.time,
                    valid: false,
                    value: IndicatorValue::Channel {
                        upper: 0.0,
                        lower: 0.0,
                    },
                };
            }
            let window = &bars[i - period..i];
            let upper = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lower = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            IndicatorPoint {
                time: bar.time,
                valid: true,
                value: IndicatorValue::Channel { upper, lower },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Donchian(period),
        values,
    }
}
