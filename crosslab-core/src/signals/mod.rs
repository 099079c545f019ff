//! Signal generation: portfolio-agnostic signal sources.
//!
//! Signals must NEVER depend on portfolio state (positions, capital, etc.).
//! They are pure market-timing transforms of the price series that emit one
//! [`Signal`] per bar. The engine decides what to do with them.

pub mod ma_crossover;
pub mod precomputed;

pub use ma_crossover::MaCrossover;
pub use precomputed::PrecomputedSignals;

use crate::domain::{Bar, Signal};

/// Portfolio-agnostic signal source.
///
/// # Invariants
/// - `generate()` returns exactly one signal per bar, stamped with that bar's timestamp
/// - `generate()` MUST be deterministic for the same bar sequence
pub trait SignalSource: Send + Sync {
    /// Signal name for manifest/logging
    fn name(&self) -> &str;

    fn generate(&self, bars: &[Bar]) -> Vec<Signal>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalValue;
    use chrono::NaiveDate;

    struct AlwaysEnter;

    impl SignalSource for AlwaysEnter {
        fn name(&self) -> &str {
            "always_enter"
        }

        fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
            bars.iter()
                .map(|b| Signal::new(b.timestamp, SignalValue::Entry))
                .collect()
        }
    }

    #[test]
    fn trait_object_builds() {
        let source: Box<dyn SignalSource> = Box::new(AlwaysEnter);
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = vec![Bar::daily(date, 100.0)];
        let signals = source.generate(&bars);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].timestamp, bars[0].timestamp);
        assert_eq!(source.name(), "always_enter");
    }
}
