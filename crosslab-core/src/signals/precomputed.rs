//! Replay of a caller-supplied signal column.

use crate::domain::{Bar, Signal, SignalValue};

use super::SignalSource;

/// Signal source that replays pre-computed values by bar index.
///
/// Bars past the end of the supplied values get `SignalValue::None`.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedSignals {
    values: Vec<SignalValue>,
}

impl PrecomputedSignals {
    pub fn new(values: Vec<SignalValue>) -> Self {
        Self { values }
    }

    /// Build from the numeric encoding (+1 / -1 / 0).
    pub fn from_i8(values: &[i8]) -> Self {
        Self::new(values.iter().map(|&v| SignalValue::from_i8(v)).collect())
    }

    /// Entry at the given bar indices, nothing elsewhere.
    pub fn entries_at(len: usize, entries: &[usize]) -> Self {
        let mut values = vec![SignalValue::None; len];
        for &i in entries {
            if i < len {
                values[i] = SignalValue::Entry;
            }
        }
        Self::new(values)
    }
}

impl SignalSource for PrecomputedSignals {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                let value = self.values.get(i).copied().unwrap_or_default();
                Signal::new(bar.timestamp, value)
            })
            .collect()
    }
}
