//! Strategy configuration and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Holding style. Decides which time-based exit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// Close any position once it has been held for a day.
    Intraday,
    /// Close any position held for `max_hold_days` or more.
    #[default]
    Swing,
}

/// What happens to a position still open after the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfRunPolicy {
    /// Leave it open. The final value point marks it to market and the trade
    /// log does not contain it.
    #[default]
    LeaveOpen,
    /// Close it at the final bar's price with `ExitReason::EndOfData`.
    Liquidate,
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("short_window ({short}) must be >= 1 and < long_window ({long})")]
    InvalidWindows { short: usize, long: usize },
    #[error("initial_capital must be positive and finite, got {0}")]
    NonPositiveCapital(f64),
    #[error("position_size_pct must be in (0, 1], got {0}")]
    InvalidPositionSize(f64),
    #[error("{field} out of range: {value}")]
    InvalidPercentage { field: &'static str, value: f64 },
    #[error("max_hold_days must be >= 1, got {0}")]
    InvalidHoldDays(u32),
}

pub const DEFAULT_MAX_HOLD_DAYS: u32 = 60;

/// Complete strategy configuration, validated before an engine is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub initial_capital: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Fraction of available cash committed per entry.
    pub position_size_pct: f64,
    pub use_trailing_stop: bool,
    pub trailing_stop_activation_pct: f64,
    pub trailing_stop_distance_pct: f64,
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default = "default_max_hold_days")]
    pub max_hold_days: u32,
    #[serde(default)]
    pub end_of_run: EndOfRunPolicy,
}

fn default_max_hold_days() -> u32 {
    DEFAULT_MAX_HOLD_DAYS
}

impl StrategyConfig {
    /// Validated config with the given windows and capital and default
    /// risk parameters (5% stop, 15% target, 50% sizing, 2%/2% trailing stop,
    /// swing mode, 60-day hold).
    pub fn new(
        short_window: usize,
        long_window: usize,
        initial_capital: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            short_window,
            long_window,
            initial_capital,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on malformed parameters. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_window == 0 || self.short_window >= self.long_window {
            return Err(ConfigError::InvalidWindows {
                short: self.short_window,
                long: self.long_window,
            });
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return Err(ConfigError::InvalidPositionSize(self.position_size_pct));
        }
        check_positive("stop_loss_pct", self.stop_loss_pct)?;
        check_positive("take_profit_pct", self.take_profit_pct)?;
        if !(self.trailing_stop_activation_pct.is_finite()
            && self.trailing_stop_activation_pct >= 0.0)
        {
            return Err(ConfigError::InvalidPercentage {
                field: "trailing_stop_activation_pct",
                value: self.trailing_stop_activation_pct,
            });
        }
        if !(self.trailing_stop_distance_pct > 0.0 && self.trailing_stop_distance_pct < 1.0) {
            return Err(ConfigError::InvalidPercentage {
                field: "trailing_stop_distance_pct",
                value: self.trailing_stop_distance_pct,
            });
        }
        if self.max_hold_days == 0 {
            return Err(ConfigError::InvalidHoldDays(self.max_hold_days));
        }
        Ok(())
    }

    pub fn with_stops(mut self, stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        self.stop_loss_pct = stop_loss_pct;
        self.take_profit_pct = take_profit_pct;
        self
    }

    pub fn with_position_size(mut self, position_size_pct: f64) -> Self {
        self.position_size_pct = position_size_pct;
        self
    }

    pub fn with_trailing_stop(mut self, activation_pct: f64, distance_pct: f64) -> Self {
        self.use_trailing_stop = true;
        self.trailing_stop_activation_pct = activation_pct;
        self.trailing_stop_distance_pct = distance_pct;
        self
    }

    pub fn without_trailing_stop(mut self) -> Self {
        self.use_trailing_stop = false;
        self
    }

    pub fn with_mode(mut self, mode: TradingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_hold_days(mut self, days: u32) -> Self {
        self.max_hold_days = days;
        self
    }

    pub fn with_end_of_run(mut self, policy: EndOfRunPolicy) -> Self {
        self.end_of_run = policy;
        self
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 50,
            initial_capital: 10_000.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.15,
            position_size_pct: 0.5,
            use_trailing_stop: true,
            trailing_stop_activation_pct: 0.02,
            trailing_stop_distance_pct: 0.02,
            mode: TradingMode::Swing,
            max_hold_days: DEFAULT_MAX_HOLD_DAYS,
            end_of_run: EndOfRunPolicy::LeaveOpen,
        }
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidPercentage { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_short_not_below_long() {
        assert_eq!(
            StrategyConfig::new(50, 50, 10_000.0),
            Err(ConfigError::InvalidWindows { short: 50, long: 50 })
        );
        assert!(StrategyConfig::new(60, 50, 10_000.0).is_err());
        assert!(StrategyConfig::new(0, 50, 10_000.0).is_err());
    }

    #[test]
    fn rejects_non_positive_capital() {
        assert_eq!(
            StrategyConfig::new(10, 50, 0.0),
            Err(ConfigError::NonPositiveCapital(0.0))
        );
        assert!(StrategyConfig::new(10, 50, -5.0).is_err());
        assert!(StrategyConfig::new(10, 50, f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_position_size_out_of_range() {
        for size in [0.0, -0.1, 1.5, f64::NAN] {
            let config = StrategyConfig::default().with_position_size(size);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidPositionSize(_))),
                "size {size} should be rejected"
            );
        }
        assert!(StrategyConfig::default().with_position_size(1.0).validate().is_ok());
    }

    #[test]
    fn rejects_bad_percentages() {
        let config = StrategyConfig::default().with_stops(0.0, 0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPercentage { field: "stop_loss_pct", .. })
        ));
        let config = StrategyConfig::default().with_trailing_stop(0.02, 1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPercentage { field: "trailing_stop_distance_pct", .. })
        ));
    }

    #[test]
    fn rejects_zero_hold_days() {
        let config = StrategyConfig::default().with_max_hold_days(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidHoldDays(0)));
    }

    #[test]
    fn serde_defaults_for_optional_fields() {
        let json = r#"{
            "short_window": 5, "long_window": 20, "initial_capital": 1000.0,
            "stop_loss_pct": 0.05, "take_profit_pct": 0.1, "position_size_pct": 0.5,
            "use_trailing_stop": false, "trailing_stop_activation_pct": 0.02,
            "trailing_stop_distance_pct": 0.02
        }"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, TradingMode::Swing);
        assert_eq!(config.max_hold_days, 60);
        assert_eq!(config.end_of_run, EndOfRunPolicy::LeaveOpen);
    }
}
