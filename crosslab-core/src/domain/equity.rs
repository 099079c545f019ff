use serde::{Deserialize, Serialize};

use super::bar::Timestamp;

/// One point of the portfolio-value series: cash plus marked-to-market shares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl EquityPoint {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Strip timestamps from a value series.
pub fn values(points: &[EquityPoint]) -> Vec<f64> {
    points.iter().map(|p| p.value).collect()
}
