//! Bar-by-bar event loop.
//!
//! Each bar goes through three steps:
//! 1. Validate the bar and its signal against the series so far
//! 2. `decide` the transition from the state before the bar
//! 3. Apply it and append the bar's portfolio value
//!
//! Bar 0 only records the initial capital; no decision is made on it.

use thiserror::Error;
use tracing::debug;

use crate::domain::{Bar, EquityPoint, ExitReason, Position, Signal, TradeRecord};
use crate::signals::SignalSource;

use super::config::{ConfigError, EndOfRunPolicy, StrategyConfig};
use super::state::{EngineState, PositionState, RunOutput};
use super::transition::{decide, SkipReason, Transition};

/// Errors from feeding malformed input to the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("{bars} bars but {signals} signals")]
    LengthMismatch { bars: usize, signals: usize },
    #[error("bar {index}: price must be positive and finite, got {price}")]
    NonPositivePrice { index: usize, price: f64 },
    #[error("bar {index}: timestamp is not after the previous bar")]
    UnorderedTimestamps { index: usize },
    #[error("bar {index}: signal timestamp does not match bar")]
    SignalTimestampMismatch { index: usize },
    #[error("empty price series")]
    EmptySeries,
}

/// Incremental engine. Feed bars with [`Engine::step`], then call
/// [`Engine::finish`].
#[derive(Debug, Clone)]
pub struct Engine {
    config: StrategyConfig,
    state: EngineState,
}

impl Engine {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = EngineState::new(config.initial_capital);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Process one bar. Returns the transition that was applied.
    ///
    /// On error the state is left untouched.
    pub fn step(&mut self, bar: &Bar, signal: &Signal) -> Result<Transition, EngineError> {
        let index = self.state.bar_index;
        self.validate(index, bar, signal)?;

        let transition = if index == 0 {
            Transition::Stay
        } else {
            decide(&self.config, &self.state, bar, signal.value)
        };
        self.apply(index, bar, transition);

        let value = self.state.portfolio_value(bar.price);
        self.state.equity.push(EquityPoint::new(bar.timestamp, value));
        self.state.last_bar = Some(*bar);
        self.state.bar_index += 1;
        Ok(transition)
    }

    /// End the run, applying the end-of-run policy to any open position.
    pub fn finish(mut self) -> RunOutput {
        if self.config.end_of_run == EndOfRunPolicy::Liquidate && !self.state.position.is_flat() {
            if let Some(bar) = self.state.last_bar {
                let index = self.state.bar_index.saturating_sub(1);
                self.close(index, &bar, ExitReason::EndOfData);
            }
        }

        let open_position = self.state.position.position().cloned();
        RunOutput {
            trades: self.state.trades,
            equity: self.state.equity,
            open_position,
            final_capital: self.state.capital,
        }
    }

    fn validate(&self, index: usize, bar: &Bar, signal: &Signal) -> Result<(), EngineError> {
        if !bar.is_valid() {
            return Err(EngineError::NonPositivePrice {
                index,
                price: bar.price,
            });
        }
        if let Some(prev) = &self.state.last_bar {
            if bar.timestamp <= prev.timestamp {
                return Err(EngineError::UnorderedTimestamps { index });
            }
        }
        if signal.timestamp != bar.timestamp {
            return Err(EngineError::SignalTimestampMismatch { index });
        }
        Ok(())
    }

    fn apply(&mut self, index: usize, bar: &Bar, transition: Transition) {
        match transition {
            Transition::Stay => {}
            Transition::Skip(SkipReason::InsufficientCapital) => {
                debug!(
                    bar = index,
                    capital = self.state.capital,
                    price = bar.price,
                    "entry skipped: budget below one share"
                );
            }
            Transition::Enter {
                shares,
                trailing_stop_level,
            } => {
                self.state.capital -= shares as f64 * bar.price;
                let mut pos = Position::open(bar.price, bar.timestamp, index, shares);
                pos.trailing_stop_level = trailing_stop_level;
                self.state.position = PositionState::Long(pos);
                debug!(bar = index, shares, price = bar.price, "entered long");
            }
            Transition::Hold {
                trailing_stop_level,
            } => {
                if let PositionState::Long(pos) = &mut self.state.position {
                    pos.trailing_stop_level = trailing_stop_level;
                }
            }
            Transition::Exit { reason } => self.close(index, bar, reason),
        }
    }

    fn close(&mut self, index: usize, bar: &Bar, reason: ExitReason) {
        let PositionState::Long(pos) = std::mem::take(&mut self.state.position) else {
            return;
        };
        self.state.capital += pos.market_value(bar.price);
        let trade = TradeRecord::close(&pos, index, bar.timestamp, bar.price, reason);
        debug!(
            bar = index,
            reason = %reason,
            pnl = trade.pnl,
            "closed position"
        );
        self.state.trades.push(trade);
    }
}

/// Run the engine over a full series with a pre-generated signal per bar.
pub fn run(
    config: &StrategyConfig,
    bars: &[Bar],
    signals: &[Signal],
) -> Result<RunOutput, EngineError> {
    if bars.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    if bars.len() != signals.len() {
        return Err(EngineError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }

    let mut engine = Engine::new(config.clone())?;
    for (bar, signal) in bars.iter().zip(signals) {
        engine.step(bar, signal)?;
    }
    Ok(engine.finish())
}

/// Generate signals from `source` and run.
pub fn run_with_source(
    config: &StrategyConfig,
    bars: &[Bar],
    source: &dyn SignalSource,
) -> Result<RunOutput, EngineError> {
    let signals = source.generate(bars);
    run(config, bars, &signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalValue;
    use crate::signals::PrecomputedSignals;
    use chrono::NaiveDate;

    fn bars(prices: &[f64]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::daily(base + chrono::Duration::days(i as i64), p))
            .collect()
    }

    #[test]
    fn empty_series_is_an_error() {
        let cfg = StrategyConfig::default();
        assert_eq!(run(&cfg, &[], &[]), Err(EngineError::EmptySeries));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let b = bars(&[100.0, 101.0]);
        let signals = vec![Signal::none(b[0].timestamp)];
        assert_eq!(
            run(&StrategyConfig::default(), &b, &signals),
            Err(EngineError::LengthMismatch { bars: 2, signals: 1 })
        );
    }

    #[test]
    fn step_rejects_bad_bars_without_mutating() {
        let mut engine = Engine::new(StrategyConfig::default()).unwrap();
        let b = bars(&[100.0, 0.0]);
        engine.step(&b[0], &Signal::none(b[0].timestamp)).unwrap();
        assert_eq!(
            engine.step(&b[1], &Signal::none(b[1].timestamp)),
            Err(EngineError::NonPositivePrice { index: 1, price: 0.0 })
        );
        assert_eq!(engine.state().equity.len(), 1);

        assert_eq!(
            engine.step(&b[0], &Signal::none(b[0].timestamp)),
            Err(EngineError::UnorderedTimestamps { index: 1 })
        );
        let good = Bar::new(b[1].timestamp, 99.0);
        assert_eq!(
            engine.step(&good, &Signal::none(b[0].timestamp)),
            Err(EngineError::SignalTimestampMismatch { index: 1 })
        );
    }

    #[test]
    fn bar_zero_entry_is_ignored() {
        let b = bars(&[100.0, 100.0, 100.0]);
        let signals = PrecomputedSignals::entries_at(3, &[0]).generate(&b);
        let out = run(&StrategyConfig::default(), &b, &signals).unwrap();
        assert!(out.open_position.is_none());
        assert!(out.equity.iter().all(|p| p.value == 10_000.0));
    }

    #[test]
    fn entry_debits_capital_and_marks_to_market() {
        let b = bars(&[100.0, 100.0, 104.0]);
        let signals = PrecomputedSignals::entries_at(3, &[1]).generate(&b);
        let out = run(&StrategyConfig::default(), &b, &signals).unwrap();
        let pos = out.open_position.unwrap();
        assert_eq!(pos.shares, 50);
        assert_eq!(out.final_capital, 5_000.0);
        assert_eq!(out.equity[1].value, 10_000.0);
        assert_eq!(out.equity[2].value, 10_200.0);
        assert!(out.trades.is_empty());
    }

    #[test]
    fn liquidate_closes_at_last_bar() {
        let b = bars(&[100.0, 100.0, 104.0]);
        let signals = PrecomputedSignals::entries_at(3, &[1]).generate(&b);
        let cfg = StrategyConfig::default().with_end_of_run(EndOfRunPolicy::Liquidate);
        let out = run(&cfg, &b, &signals).unwrap();
        assert!(out.open_position.is_none());
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(out.trades[0].exit_index, 2);
        assert_eq!(out.final_capital, out.final_value().unwrap());
    }

    #[test]
    fn signal_exit_round_trip() {
        let b = bars(&[100.0, 100.0, 101.0, 101.0]);
        let mut values = vec![SignalValue::None; 4];
        values[1] = SignalValue::Entry;
        values[3] = SignalValue::Exit;
        let signals = PrecomputedSignals::new(values).generate(&b);
        let cfg = StrategyConfig::default().without_trailing_stop();
        let out = run(&cfg, &b, &signals).unwrap();
        assert_eq!(out.trades.len(), 1);
        let trade = &out.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_eq!(trade.pnl, 50.0);
        assert_eq!(out.final_capital, 10_050.0);
    }

    #[test]
    fn zero_activation_trailing_stop_arms_on_entry_bar() {
        let b = bars(&[100.0, 100.0, 97.5, 97.0]);
        let signals = PrecomputedSignals::entries_at(4, &[1]).generate(&b);
        let cfg = StrategyConfig::default().with_trailing_stop(0.0, 0.02);

        let mut engine = Engine::new(cfg).unwrap();
        engine.step(&b[0], &signals[0]).unwrap();
        engine.step(&b[1], &signals[1]).unwrap();
        let armed = engine.state().position.position().unwrap().trailing_stop_level;
        assert!((armed - 98.0).abs() < 1e-9);

        engine.step(&b[2], &signals[2]).unwrap();
        engine.step(&b[3], &signals[3]).unwrap();
        let out = engine.finish();
        assert!(out.open_position.is_none());
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(out.trades[0].exit_index, 2);
    }
}
