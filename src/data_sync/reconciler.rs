use crate::constants::NATIVE_ASSET_ID;
use crate::data_sync::source::BalanceSource;
use crate::data_sync::subscriptions::SubscriptionRegistry;
use crate::error::{BalanceError, BalanceResult};
use crate::logic::diff::diff;
use crate::logic::types::{BalanceDiff, BalanceSnapshot, BalanceState};
use crate::utils::asset_cache::AssetCache;
use crate::utils::money::Money;
use std::iter;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info};

/// Runs one refresh cycle for an address and owns the resulting state.
///
/// A cycle either publishes a complete new [`BalanceState`] or leaves the
/// current one untouched; there is no partially applied refresh.
pub struct BalanceReconciler {
    address: String,
    source: Arc<dyn BalanceSource>,
    assets: AssetCache,
    state: RwLock<Arc<BalanceState>>,
    subscribers: Arc<SubscriptionRegistry>,
}

impl BalanceReconciler {
    pub fn new(
        address: impl Into<String>,
        source: Arc<dyn BalanceSource>,
        assets: AssetCache,
        subscribers: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            address: address.into(),
            source,
            assets,
            state: RwLock::new(Arc::new(BalanceState::default())),
            subscribers,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current state; readers always get one full snapshot.
    pub fn state(&self) -> Arc<BalanceState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn has_data(&self) -> bool {
        self.state().has_data
    }

    /// Fetch, merge and diff. Publishes and notifies subscribers only when
    /// something changed. Errors are returned as is, with no state touched.
    ///
    /// Not reentrant: two overlapping calls would diff against the same state.
    /// Everything outside this crate refreshes through [`CycleGate`].
    ///
    /// [`CycleGate`]: crate::data_sync::scheduler::CycleGate
    pub(crate) async fn reconcile(&self) -> BalanceResult<Option<BalanceDiff>> {
        let started = Instant::now();
        debug!(address = %self.address, "refreshing balances");

        let details = self.source.fetch_balance_details(&self.address).await?;
        let tokens = self.source.fetch_token_balances(&self.address).await?;

        let ids = iter::once(NATIVE_ASSET_ID).chain(tokens.iter().map(|token| token.asset_id.as_str()));
        let assets = self.assets.resolve(ids).await?;

        let native_asset = assets
            .get(NATIVE_ASSET_ID)
            .cloned()
            .ok_or_else(|| BalanceError::malformed("native asset metadata missing"))?;

        let mut balances = BalanceSnapshot::new();
        for token in tokens {
            if token.asset_id == NATIVE_ASSET_ID {
                continue;
            }
            let asset = assets
                .get(&token.asset_id)
                .cloned()
                .ok_or_else(|| BalanceError::malformed(format!("metadata missing for {}", token.asset_id)))?;
            balances.insert(token.asset_id, Money::new(token.balance, asset));
        }
        balances.insert(
            NATIVE_ASSET_ID.to_string(),
            Money::new(details.available, Arc::clone(&native_asset)),
        );

        let Some(changes) = diff(&self.state().balances, &balances) else {
            debug!(address = %self.address, elapsed = ?started.elapsed(), "balances unchanged");
            return Ok(None);
        };

        let next = Arc::new(BalanceState::new(balances, Some(native_asset)));
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);

        info!(
            address = %self.address,
            assets = next.balances.len(),
            changed = changes.len(),
            fee_assets = next.fee_list.len(),
            elapsed = ?started.elapsed(),
            "balances updated"
        );

        self.subscribers.dispatch(&next.balances, &changes);
        Ok(Some(changes))
    }
}
