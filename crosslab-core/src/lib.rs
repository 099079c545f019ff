//! Crosslab Core: domain types, signal sources, position management, engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, signals, positions, trades, equity points)
//! - Moving-average crossover and pre-computed signal sources
//! - Position sizing and the ratcheting trailing stop
//! - Bar-by-bar engine with a pure per-bar decision function

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod position_management;
pub mod signals;
