use crate::data_sync::source::{AssetSource, BalanceDetails, BalanceSource, TokenBalance};
use crate::error::{BalanceError, BalanceResult};
use crate::utils::asset::Asset;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    available: u64,
    tokens: Vec<TokenBalance>,
    assets: HashMap<String, Asset>,
    fee: u64,
    latency: Duration,
    asset_fetches: HashMap<String, usize>,
    last_fee_request: Option<serde_json::Value>,
}

/// In-memory backend with switchable failures and latency.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    failing_balance_fetches: AtomicU32,
    failing_asset_fetches: AtomicU32,
    balance_fetches: AtomicUsize,
    asset_batches: AtomicUsize,
    active_balance_fetches: AtomicUsize,
    max_active_balance_fetches: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_asset(&self, asset: Asset) {
        self.state().assets.insert(asset.get_id().to_string(), asset);
    }

    pub fn set_native_balance(&self, available: u64) {
        self.state().available = available;
    }

    pub fn set_token_balances(&self, tokens: Vec<TokenBalance>) {
        self.state().tokens = tokens;
    }

    pub fn set_fee(&self, fee: u64) {
        self.state().fee = fee;
    }

    /// Delay applied to every call, to keep requests in flight during tests.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Make the next `count` balance-details calls fail.
    pub fn fail_balance_fetches(&self, count: u32) {
        self.failing_balance_fetches.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` asset batches fail.
    pub fn fail_asset_fetches(&self, count: u32) {
        self.failing_asset_fetches.store(count, Ordering::SeqCst);
    }

    pub fn balance_fetches(&self) -> usize {
        self.balance_fetches.load(Ordering::SeqCst)
    }

    pub fn asset_batches(&self) -> usize {
        self.asset_batches.load(Ordering::SeqCst)
    }

    pub fn asset_fetches_for(&self, id: &str) -> usize {
        self.state().asset_fetches.get(id).copied().unwrap_or_default()
    }

    /// Highest number of balance-details calls that were running at once.
    pub fn max_concurrent_balance_fetches(&self) -> usize {
        self.max_active_balance_fetches.load(Ordering::SeqCst)
    }

    pub fn last_fee_request(&self) -> Option<serde_json::Value> {
        self.state().last_fee_request.clone()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn pause(&self) {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AssetSource for MockSource {
    async fn fetch_assets(&self, ids: &[String]) -> BalanceResult<Vec<Option<Asset>>> {
        self.asset_batches.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state();
            for id in ids {
                *state.asset_fetches.entry(id.clone()).or_default() += 1;
            }
        }
        self.pause().await;
        if Self::take_failure(&self.failing_asset_fetches) {
            return Err(BalanceError::fetch("asset service returned 503"));
        }
        let state = self.state();
        Ok(ids.iter().map(|id| state.assets.get(id).cloned()).collect())
    }
}

#[async_trait]
impl BalanceSource for MockSource {
    async fn fetch_balance_details(&self, _address: &str) -> BalanceResult<BalanceDetails> {
        self.balance_fetches.fetch_add(1, Ordering::SeqCst);
        let active = self.active_balance_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_balance_fetches.fetch_max(active, Ordering::SeqCst);
        self.pause().await;
        self.active_balance_fetches.fetch_sub(1, Ordering::SeqCst);

        if Self::take_failure(&self.failing_balance_fetches) {
            return Err(BalanceError::fetch("node returned 502"));
        }
        Ok(BalanceDetails::with_available(self.state().available))
    }

    async fn fetch_token_balances(&self, _address: &str) -> BalanceResult<Vec<TokenBalance>> {
        Ok(self.state().tokens.clone())
    }

    async fn fetch_fee(&self, tx: &serde_json::Value) -> BalanceResult<u64> {
        let mut state = self.state();
        state.last_fee_request = Some(tx.clone());
        Ok(state.fee)
    }
}
