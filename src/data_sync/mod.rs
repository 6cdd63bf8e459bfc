/// Data Synchronization Layer
///
/// Keeps the balances of one address in sync with the remote services:
///
/// - fetch boundary (`BalanceSource`, `AssetSource`) with HTTP and in-memory backends
/// - one refresh cycle per call (`BalanceReconciler`)
/// - overlap-free polling and retry (`CycleGate`, `PollScheduler`, `RetryPolicy`)
/// - change notification (`SubscriptionRegistry`)
/// - the caller-facing `BalanceTracker`
pub mod config;
pub mod http_source;
pub mod mock_source;
pub mod reconciler;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod subscriptions;


pub use config::TrackerConfig;
pub use http_source::HttpSource;
pub use mock_source::MockSource;
pub use reconciler::BalanceReconciler;
pub use scheduler::{CycleGate, PollScheduler, RetryPolicy, StopSignal, TrackerHealth, retry_with_policy};
pub use service::{BalanceTracker, BalanceTrackerBuilder};
pub use source::{AssetSource, BalanceDetails, BalanceSource, TokenBalance};
pub use subscriptions::{SubscriptionId, SubscriptionRegistry, UpdateCallback};
