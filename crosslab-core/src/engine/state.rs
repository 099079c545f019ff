//! Mutable engine state and run result types.

use crate::domain::{Bar, EquityPoint, Position, TradeRecord};
use serde::{Deserialize, Serialize};

/// Position state machine. At most one long position exists at a time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PositionState {
    #[default]
    Flat,
    Long(Position),
}

impl PositionState {
    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(pos) => Some(pos),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn shares(&self) -> u64 {
        self.position().map_or(0, |p| p.shares)
    }
}

/// Mutable state that evolves bar-by-bar during the engine loop.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Uninvested cash.
    pub capital: f64,
    pub position: PositionState,
    /// Index of the next bar to be processed.
    pub bar_index: usize,
    pub last_bar: Option<Bar>,
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquityPoint>,
}

impl EngineState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            position: PositionState::Flat,
            bar_index: 0,
            last_bar: None,
            trades: Vec::new(),
            equity: Vec::new(),
        }
    }

    /// Cash plus the open position marked at `price`.
    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.capital + self.position.shares() as f64 * price
    }
}

/// Output of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub trades: Vec<TradeRecord>,
    /// One point per bar: cash plus shares marked at that bar's price.
    pub equity: Vec<EquityPoint>,
    /// Position still open after the last bar (never set under liquidation).
    pub open_position: Option<Position>,
    pub final_capital: f64,
}

impl RunOutput {
    pub fn final_value(&self) -> Option<f64> {
        self.equity.last().map(|p| p.value)
    }
}
