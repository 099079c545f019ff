//! Pure per-bar decision function.
//!
//! `decide` inspects the state before a bar and returns what should happen on
//! it. It never mutates anything; the loop applies the transition.

use crate::domain::{Bar, ExitReason, Position, SignalValue};
use crate::position_management::{shares_for, TrailingStop};

use super::config::{StrategyConfig, TradingMode};
use super::state::{EngineState, PositionState};

/// Why an entry signal did not open a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The sizing budget buys less than one share.
    InsufficientCapital,
}

/// Outcome of one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Flat and nothing to do.
    Stay,
    /// Entry signal ignored.
    Skip(SkipReason),
    /// Open long. Carries the trailing-stop level armed on the entry bar.
    Enter { shares: u64, trailing_stop_level: f64 },
    /// Still long. Carries the trailing-stop level after this bar.
    Hold { trailing_stop_level: f64 },
    Exit { reason: ExitReason },
}

/// Decide the transition for the next bar.
///
/// An exit consumes the bar, so a position closed on a bar is never reopened
/// on that same bar.
pub fn decide(
    config: &StrategyConfig,
    state: &EngineState,
    bar: &Bar,
    signal: SignalValue,
) -> Transition {
    match &state.position {
        PositionState::Long(pos) => match exit_reason(config, pos, bar, signal) {
            Some(reason) => Transition::Exit { reason },
            None => {
                let level = pos.trailing_stop_level;
                Transition::Hold {
                    trailing_stop_level: ratchet(config, level, bar.price, pos.entry_price),
                }
            }
        },
        PositionState::Flat => {
            if signal != SignalValue::Entry {
                return Transition::Stay;
            }
            match shares_for(state.capital, config.position_size_pct, bar.price) {
                0 => Transition::Skip(SkipReason::InsufficientCapital),
                shares => Transition::Enter {
                    shares,
                    trailing_stop_level: ratchet(config, 0.0, bar.price, bar.price),
                },
            }
        }
    }
}

/// Trailing-stop level after `price`, starting from `level`.
fn ratchet(config: &StrategyConfig, level: f64, price: f64, entry_price: f64) -> f64 {
    let mut stop = TrailingStop::with_level(
        config.trailing_stop_activation_pct,
        config.trailing_stop_distance_pct,
        level,
    );
    if config.use_trailing_stop {
        stop.update(price, entry_price)
    } else {
        stop.level()
    }
}

/// First matching exit rule, in priority order:
/// take profit, trailing stop, stop loss, day close / time exit, signal.
///
/// The trailing stop is tested against the level left by the previous bar.
pub fn exit_reason(
    config: &StrategyConfig,
    pos: &Position,
    bar: &Bar,
    signal: SignalValue,
) -> Option<ExitReason> {
    let pnl_pct = pos.pnl_pct(bar.price);

    if pnl_pct >= config.take_profit_pct {
        return Some(ExitReason::TakeProfit);
    }

    let stop = TrailingStop::with_level(
        config.trailing_stop_activation_pct,
        config.trailing_stop_distance_pct,
        pos.trailing_stop_level,
    );
    if config.use_trailing_stop && stop.is_hit(bar.price) {
        return Some(ExitReason::TrailingStop);
    }

    if pnl_pct <= -config.stop_loss_pct {
        return Some(ExitReason::StopLoss);
    }

    let days_held = pos.days_held(bar.timestamp);
    match config.mode {
        TradingMode::Intraday if days_held >= 1 => return Some(ExitReason::DayClose),
        TradingMode::Swing if days_held >= i64::from(config.max_hold_days) => {
            return Some(ExitReason::TimeExit)
        }
        _ => {}
    }

    if signal == SignalValue::Exit {
        return Some(ExitReason::Signal);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamp;
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn config() -> StrategyConfig {
        StrategyConfig::default()
            .with_stops(0.05, 0.10)
            .with_trailing_stop(0.02, 0.02)
    }

    fn long_state(level: f64) -> EngineState {
        let mut state = EngineState::new(10_000.0);
        let mut pos = Position::open(100.0, ts(1), 1, 10);
        pos.trailing_stop_level = level;
        state.position = PositionState::Long(pos);
        state
    }

    #[test]
    fn take_profit_beats_everything() {
        let state = long_state(200.0);
        let t = decide(&config(), &state, &Bar::daily(ts(2).date(), 110.0), SignalValue::Exit);
        assert_eq!(t, Transition::Exit { reason: ExitReason::TakeProfit });
    }

    #[test]
    fn trailing_stop_beats_signal() {
        let state = long_state(104.0);
        let t = decide(&config(), &state, &Bar::daily(ts(2).date(), 103.0), SignalValue::Exit);
        assert_eq!(t, Transition::Exit { reason: ExitReason::TrailingStop });
    }

    #[test]
    fn trailing_stop_ignored_when_disabled() {
        let state = long_state(104.0);
        let cfg = config().without_trailing_stop();
        let t = decide(&cfg, &state, &Bar::daily(ts(2).date(), 103.0), SignalValue::None);
        assert_eq!(t, Transition::Hold { trailing_stop_level: 104.0 });
    }

    #[test]
    fn stop_loss_at_exact_threshold() {
        let state = long_state(0.0);
        let t = decide(&config(), &state, &Bar::daily(ts(2).date(), 95.0), SignalValue::None);
        assert_eq!(t, Transition::Exit { reason: ExitReason::StopLoss });
    }

    #[test]
    fn time_exit_by_mode() {
        let state = long_state(0.0);
        let bar = Bar::daily(ts(2).date(), 100.0);
        let intraday = config().with_mode(TradingMode::Intraday);
        assert_eq!(
            decide(&intraday, &state, &bar, SignalValue::None),
            Transition::Exit { reason: ExitReason::DayClose }
        );
        let swing = config().with_max_hold_days(3);
        assert!(matches!(
            decide(&swing, &state, &bar, SignalValue::None),
            Transition::Hold { .. }
        ));
        let late = Bar::daily(ts(4).date(), 100.0);
        assert_eq!(
            decide(&swing, &state, &late, SignalValue::None),
            Transition::Exit { reason: ExitReason::TimeExit }
        );
    }

    #[test]
    fn signal_exit_is_last_resort() {
        let state = long_state(0.0);
        let t = decide(&config(), &state, &Bar::daily(ts(1).date(), 100.0), SignalValue::Exit);
        assert_eq!(t, Transition::Exit { reason: ExitReason::Signal });
    }

    #[test]
    fn hold_ratchets_trailing_stop() {
        let state = long_state(0.0);
        let t = decide(&config(), &state, &Bar::daily(ts(1).date(), 105.0), SignalValue::None);
        match t {
            Transition::Hold { trailing_stop_level } => {
                assert!((trailing_stop_level - 102.9).abs() < 1e-9)
            }
            other => panic!("expected hold, got {other:?}"),
        }
    }

    #[test]
    fn flat_entry_paths() {
        let cfg = config().with_position_size(0.5);
        let bar = Bar::daily(ts(3).date(), 100.0);
        let mut state = EngineState::new(10_000.0);

        assert_eq!(decide(&cfg, &state, &bar, SignalValue::None), Transition::Stay);
        assert_eq!(decide(&cfg, &state, &bar, SignalValue::Exit), Transition::Stay);
        assert_eq!(
            decide(&cfg, &state, &bar, SignalValue::Entry),
            Transition::Enter { shares: 50, trailing_stop_level: 0.0 }
        );

        state.capital = 150.0;
        assert_eq!(
            decide(&cfg, &state, &bar, SignalValue::Entry),
            Transition::Skip(SkipReason::InsufficientCapital)
        );
    }

    #[test]
    fn zero_activation_arms_on_entry_bar() {
        let cfg = config().with_trailing_stop(0.0, 0.02).with_position_size(0.5);
        let state = EngineState::new(10_000.0);
        let bar = Bar::daily(ts(3).date(), 100.0);
        match decide(&cfg, &state, &bar, SignalValue::Entry) {
            Transition::Enter { shares, trailing_stop_level } => {
                assert_eq!(shares, 50);
                assert!((trailing_stop_level - 98.0).abs() < 1e-9);
            }
            other => panic!("expected entry, got {other:?}"),
        }

        let disabled = cfg.without_trailing_stop();
        assert_eq!(
            decide(&disabled, &state, &bar, SignalValue::Entry),
            Transition::Enter { shares: 50, trailing_stop_level: 0.0 }
        );
    }
}
