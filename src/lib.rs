// Two-Layer Architecture
pub mod data_sync; // Data Layer: fetching, reconciliation, polling, subscriptions
pub mod logic; // Logic Layer: snapshot diffing, fee conversion

// Common utilities and types
pub mod constants;
pub mod error;
pub mod utils;

pub use data_sync::{
    AssetSource, BalanceSource, BalanceTracker, BalanceTrackerBuilder, HttpSource, MockSource, RetryPolicy,
    SubscriptionId, TrackerConfig, TrackerHealth,
};
pub use error::{BalanceError, BalanceResult};
pub use logic::{BalanceDiff, BalanceSnapshot, BalanceState, FeeCalculator, FeeConversion, diff};
pub use utils::{Asset, AssetCache, AssetWrapper, Money, VerifiedStatus};
