//! Backtesting engine: a long-only, single-instrument state machine driven
//! one bar at a time.
//!
//! Per bar, an open position is checked against the exit rules in priority
//! order; a flat book may enter on an entry signal. Each bar appends one
//! portfolio value point.

pub mod config;
pub mod loop_runner;
pub mod state;
pub mod transition;

pub use config::{ConfigError, EndOfRunPolicy, StrategyConfig, TradingMode};
pub use loop_runner::{run, run_with_source, Engine, EngineError};
pub use state::{EngineState, PositionState, RunOutput};
pub use transition::{decide, exit_reason, SkipReason, Transition};
