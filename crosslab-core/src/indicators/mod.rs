//! Indicators used by the built-in signal sources.

pub mod sma;

pub use sma::Sma;
