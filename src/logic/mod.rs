/// Logic Layer
///
/// Pure computations over balance snapshots:
/// - snapshot diffing (what changed since the last refresh)
/// - fee-eligible asset selection
/// - native fee to sponsored fee conversion
pub mod diff;
pub mod fee_calculator;
pub mod types;

pub use diff::diff;
pub use fee_calculator::{FeeCalculator, FeeConversion};
pub use types::{BalanceDiff, BalanceSnapshot, BalanceState, fee_eligible};
