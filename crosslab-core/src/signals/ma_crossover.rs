//! Moving average crossover signal: golden cross and death cross detection.
//!
//! Emits Entry when the short MA crosses above the long MA (golden cross).
//! Emits Exit when the short MA crosses below the long MA (death cross).

use crate::domain::{Bar, Signal, SignalValue};
use crate::indicators::Sma;

use super::SignalSource;

/// Moving average crossover signal source.
///
/// Both averages are simple moving averages over prices with partial windows
/// at the start of the series, so a crossover can fire before `long_window`
/// bars have elapsed. Bar 0 never carries a signal.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    short: Sma,
    long: Sma,
}

impl MaCrossover {
    /// Callers validate `short_window < long_window` through `StrategyConfig`.
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short: Sma::new(short_window.max(1)),
            long: Sma::new(long_window.max(1)),
        }
    }

    pub fn short_window(&self) -> usize {
        self.short.period()
    }

    pub fn long_window(&self) -> usize {
        self.long.period()
    }

    /// Short and long moving averages, one value per bar.
    pub fn moving_averages(&self, bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
        let prices: Vec<f64> = bars.iter().map(|b| b.price).collect();
        (self.short.compute(&prices), self.long.compute(&prices))
    }
}

impl SignalSource for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let (short, long) = self.moving_averages(bars);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                if i == 0 {
                    return Signal::none(bar.timestamp);
                }
                let (cur_s, cur_l) = (short[i], long[i]);
                let (prev_s, prev_l) = (short[i - 1], long[i - 1]);

                let value = if cur_s > cur_l && prev_s <= prev_l {
                    SignalValue::Entry
                } else if cur_s < cur_l && prev_s >= prev_l {
                    SignalValue::Exit
                } else {
                    SignalValue::None
                };
                Signal::new(bar.timestamp, value)
            })
            .collect()
    }
}
