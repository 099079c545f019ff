//! Position sizing: fraction of available cash, whole shares only.

/// Number of whole shares to buy with `position_size_pct` of `capital` at
/// `price`: `floor(capital * position_size_pct / price)`.
///
/// Returns 0 when the budget does not cover a single share or any input is
/// degenerate. With `position_size_pct <= 1` the cost never exceeds `capital`.
pub fn shares_for(capital: f64, position_size_pct: f64, price: f64) -> u64 {
    if !(price.is_finite() && price > 0.0) || !(capital.is_finite() && capital > 0.0) {
        return 0;
    }
    let budget = capital * position_size_pct;
    let shares = (budget / price).floor();
    if shares < 1.0 {
        return 0;
    }
    shares as u64
}
