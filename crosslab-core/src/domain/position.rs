use serde::{Deserialize, Serialize};

use super::bar::Timestamp;

/// Open long position. Owned by the engine; at most one exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_price: f64,
    pub entry_timestamp: Timestamp,
    pub entry_index: usize,
    pub shares: u64,
    /// 0.0 while the trailing stop is inactive.
    pub trailing_stop_level: f64,
}

impl Position {
    pub fn open(entry_price: f64, entry_timestamp: Timestamp, entry_index: usize, shares: u64) -> Self {
        Self {
            entry_price,
            entry_timestamp,
            entry_index,
            shares,
            trailing_stop_level: 0.0,
        }
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.shares as f64 * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.shares as f64 * (current_price - self.entry_price)
    }

    /// Unrealized return as a fraction of the entry price.
    pub fn pnl_pct(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) / self.entry_price
    }

    /// Whole calendar days since entry.
    pub fn days_held(&self, now: Timestamp) -> i64 {
        (now - self.entry_timestamp).num_days()
    }
}
