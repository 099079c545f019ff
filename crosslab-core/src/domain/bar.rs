//! Bar: one observation of the replayed price series.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the engine.
pub type Timestamp = NaiveDateTime;

/// Single price observation for the traded instrument.
///
/// Timestamps are strictly ascending across a series. Irregular spacing
/// (weekends, holidays, missing sessions) is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub price: f64,
}

impl Bar {
    pub fn new(timestamp: Timestamp, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Bar stamped at midnight of `date`. Daily series use this.
    pub fn daily(date: NaiveDate, price: f64) -> Self {
        Self {
            timestamp: date.and_hms_opt(0, 0, 0).unwrap_or_default(),
            price,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// A price must be finite and strictly positive to be tradable.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}
