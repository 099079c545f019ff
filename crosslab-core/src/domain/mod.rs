//! Domain types for CrossLab

pub mod bar;
pub mod equity;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, Timestamp};
pub use equity::EquityPoint;
pub use position::Position;
pub use signal::{Signal, SignalValue};
pub use trade::{ExitReason, TradeRecord};
