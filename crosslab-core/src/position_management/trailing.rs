/// Trailing stop with activation threshold and ratchet invariant.
///
/// **Core Rule:** once armed, the stop may only rise, never loosen.
///
/// The stop stays inactive (level 0.0) until the unrealized return reaches the
/// activation threshold. From then on each update proposes
/// `price * (1 - distance_pct)` and keeps the higher of the proposal and the
/// current level.
use serde::{Deserialize, Serialize};

/// Compute the next trailing-stop level.
///
/// Returns `current_level` unchanged while `(current_price - entry_price) /
/// entry_price < activation_pct`. Otherwise returns
/// `max(current_price * (1 - distance_pct), current_level)`.
///
/// # Example
/// ```
/// use crosslab_core::position_management::update_trailing_stop;
///
/// // 1% up, activation at 2%: still inactive.
/// assert_eq!(update_trailing_stop(101.0, 100.0, 0.0, 0.02, 0.05), 0.0);
///
/// // 10% up: armed at 110 * 0.95.
/// let level = update_trailing_stop(110.0, 100.0, 0.0, 0.02, 0.05);
/// assert!((level - 104.5).abs() < 1e-9);
///
/// // Pullback to 107: the proposal (101.65) is looser, level holds.
/// assert_eq!(update_trailing_stop(107.0, 100.0, level, 0.02, 0.05), level);
/// ```
pub fn update_trailing_stop(
    current_price: f64,
    entry_price: f64,
    current_level: f64,
    activation_pct: f64,
    distance_pct: f64,
) -> f64 {
    let pnl_pct = (current_price - entry_price) / entry_price;
    if pnl_pct < activation_pct {
        return current_level;
    }
    let candidate = current_price * (1.0 - distance_pct);
    candidate.max(current_level)
}

/// Trailing-stop state for one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    /// Current stop level (0.0 = inactive).
    level: f64,
    activation_pct: f64,
    distance_pct: f64,
}

impl TrailingStop {
    pub fn new(activation_pct: f64, distance_pct: f64) -> Self {
        Self {
            level: 0.0,
            activation_pct,
            distance_pct,
        }
    }

    /// Resume tracking from a known level.
    pub fn with_level(activation_pct: f64, distance_pct: f64, level: f64) -> Self {
        Self {
            level,
            activation_pct,
            distance_pct,
        }
    }

    /// Ratchet with the latest price. Returns the new level.
    pub fn update(&mut self, current_price: f64, entry_price: f64) -> f64 {
        self.level = update_trailing_stop(
            current_price,
            entry_price,
            self.level,
            self.activation_pct,
            self.distance_pct,
        );
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.level > 0.0
    }

    /// True when the stop is armed and `price` is at or below it.
    pub fn is_hit(&self, price: f64) -> bool {
        self.is_active() && price <= self.level
    }
}
