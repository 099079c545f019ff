//! Simple Moving Average (SMA).
//!
//! Rolling mean of prices over a lookback window. Until `period` values are
//! available the mean is taken over the values seen so far, so every index
//! has a value (no warmup NaNs).

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn compute(&self, prices: &[f64]) -> Vec<f64> {
        let mut result = Vec::with_capacity(prices.len());
        let mut sum = 0.0;

        for (i, &price) in prices.iter().enumerate() {
            sum += price;
            if i >= self.period {
                sum -= prices[i - self.period];
            }
            let count = (i + 1).min(self.period);
            result.push(sum / count as f64);
        }

        result
    }
}
