//! Discrete per-bar trading signal.

use serde::{Deserialize, Serialize};

use super::bar::Timestamp;

/// Signal value emitted for a bar: enter long, exit long, or do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalValue {
    Entry,
    Exit,
    #[default]
    None,
}

impl SignalValue {
    /// Numeric encoding: +1 entry, -1 exit, 0 none.
    pub fn as_i8(self) -> i8 {
        match self {
            SignalValue::Entry => 1,
            SignalValue::Exit => -1,
            SignalValue::None => 0,
        }
    }

    /// Decode the numeric encoding. Any positive value is an entry, any
    /// negative value an exit.
    pub fn from_i8(value: i8) -> Self {
        match value.signum() {
            1 => SignalValue::Entry,
            -1 => SignalValue::Exit,
            _ => SignalValue::None,
        }
    }
}

/// Signal stamped with the bar it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: Timestamp,
    pub value: SignalValue,
}

impl Signal {
    pub fn new(timestamp: Timestamp, value: SignalValue) -> Self {
        Self { timestamp, value }
    }

    pub fn none(timestamp: Timestamp) -> Self {
        Self::new(timestamp, SignalValue::None)
    }
}
