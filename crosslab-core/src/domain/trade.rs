//! TradeRecord: a completed round-trip trade.

use super::bar::Timestamp;
use super::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    TrailingStop,
    DayClose,
    TimeExit,
    /// Forced liquidation at the final bar. Only produced when the run is
    /// configured to liquidate; the default leaves the position open.
    EndOfData,
}

impl ExitReason {
    pub const ALL: [ExitReason; 7] = [
        ExitReason::Signal,
        ExitReason::StopLoss,
        ExitReason::TakeProfit,
        ExitReason::TrailingStop,
        ExitReason::DayClose,
        ExitReason::TimeExit,
        ExitReason::EndOfData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::DayClose => "day_close",
            ExitReason::TimeExit => "time_exit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round-trip trade record: entry → exit. Never mutated after
/// the engine appends it to the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_timestamp: Timestamp,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_timestamp: Timestamp,
    pub exit_price: f64,

    // ── Size ──
    pub shares: u64,

    // ── PnL ──
    pub pnl: f64,
    /// Return on the entry price, in percent.
    pub pnl_pct: f64,

    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// Close `position` at `exit_price`.
    pub fn close(
        position: &Position,
        exit_index: usize,
        exit_timestamp: Timestamp,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> Self {
        Self {
            entry_index: position.entry_index,
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            exit_index,
            exit_timestamp,
            exit_price,
            shares: position.shares,
            pnl: position.unrealized_pnl(exit_price),
            pnl_pct: position.pnl_pct(exit_price) * 100.0,
            exit_reason,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }
}
