//! Position management: trailing-stop ratchet and share sizing.
//!
//! Both are pure helpers used by the engine. The ratchet invariant lives
//! here: a trailing stop may tighten but never loosen.

pub mod sizing;
pub mod trailing;

pub use sizing::shares_for;
pub use trailing::{update_trailing_stop, TrailingStop};
