use crate::data_sync::config::TrackerConfig;
use crate::data_sync::http_source::HttpSource;
use crate::data_sync::reconciler::BalanceReconciler;
use crate::data_sync::scheduler::{CycleGate, PollScheduler, RetryPolicy, StopSignal, TrackerHealth, retry_with_policy};
use crate::data_sync::source::{AssetSource, BalanceSource};
use crate::data_sync::subscriptions::{SubscriptionId, SubscriptionRegistry};
use crate::error::{BalanceError, BalanceResult};
use crate::logic::fee_calculator::{FeeCalculator, FeeConversion};
use crate::logic::types::{BalanceDiff, BalanceSnapshot, BalanceState};
use crate::utils::asset::AssetWrapper;
use crate::utils::asset_cache::AssetCache;
use crate::utils::money::Money;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

type SharedLoad = Shared<BoxFuture<'static, BalanceResult<()>>>;

/// Balance tracker for one address
///
/// Owns the asset cache, the reconciler, the cycle gate and the optional
/// polling loop. Every refresh, whether triggered by the poller, the initial
/// load or a caller, goes through the same gate, so at most one cycle runs
/// at a time.
pub struct BalanceTracker {
    config: TrackerConfig,
    balances: Arc<dyn BalanceSource>,
    assets: AssetCache,
    reconciler: Arc<BalanceReconciler>,
    gate: Arc<CycleGate>,
    subscribers: Arc<SubscriptionRegistry>,
    fees: FeeCalculator,
    policy: RetryPolicy,
    stop: StopSignal,
    initial_load: Mutex<Option<SharedLoad>>,
    scheduler: Mutex<Option<PollScheduler>>,
}

impl BalanceTracker {
    /// Create a tracker backed by one source serving both balances and assets
    pub fn new<S>(config: TrackerConfig, source: Arc<S>) -> Self
    where
        S: BalanceSource + AssetSource + 'static,
    {
        Self::with_sources(config, source.clone(), source)
    }

    pub fn with_sources(
        config: TrackerConfig,
        balances: Arc<dyn BalanceSource>,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        let assets = AssetCache::new(assets);
        let subscribers = Arc::new(SubscriptionRegistry::new());
        let reconciler = Arc::new(BalanceReconciler::new(
            config.address.clone(),
            Arc::clone(&balances),
            assets.clone(),
            Arc::clone(&subscribers),
        ));
        let gate = Arc::new(CycleGate::new(Arc::clone(&reconciler)));
        let policy = config.retry_policy();

        Self {
            config,
            balances,
            assets,
            reconciler,
            gate,
            subscribers,
            fees: FeeCalculator::new(),
            policy,
            stop: StopSignal::new(),
            initial_load: Mutex::new(None),
            scheduler: Mutex::new(None),
        }
    }

    /// Begin the initial load and, if an update interval is configured, polling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.stop.is_stopped() {
            warn!(address = %self.config.address, "start called on a destroyed tracker");
            return;
        }
        info!(address = %self.config.address, "starting balance tracker");
        // The load runs in its own task; awaiting it is up to `ready`.
        let _ = self.initial_load();

        let Some(interval) = self.config.update_interval() else {
            return;
        };
        let mut scheduler = lock(&self.scheduler);
        if scheduler.is_none() {
            let mut poller = PollScheduler::new(Arc::clone(&self.gate), interval, self.stop.clone());
            poller.start();
            *scheduler = Some(poller);
        }
    }

    /// Resolves once a first refresh has succeeded.
    ///
    /// Failed cycles are retried with the configured delay. A load that gave
    /// up (bounded policy) or was cancelled is restarted by the next call.
    pub async fn ready(&self) -> BalanceResult<()> {
        self.initial_load().await
    }

    /// Refresh now and return the resulting snapshot. Joins the cycle in
    /// flight instead of starting a second one.
    pub async fn get_balances(&self) -> BalanceResult<BalanceSnapshot> {
        if self.reconciler.has_data() {
            self.gate.run().await?;
        } else {
            self.ready().await?;
        }
        Ok(self.reconciler.state().balances.clone())
    }

    /// Metadata for `ids`, in request order. Failed lookups are retried
    /// with the tracker's retry policy.
    pub async fn get_assets<I, S>(&self, ids: I) -> BalanceResult<Vec<AssetWrapper>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let resolved = retry_with_policy(self.policy, &self.stop, "asset lookup", || {
            self.assets.resolve(ids.iter())
        })
        .await?;

        ids.iter()
            .map(|id| {
                resolved
                    .get(id)
                    .cloned()
                    .ok_or_else(|| BalanceError::malformed(format!("asset {id} not resolved")))
            })
            .collect()
    }

    /// Fee for `tx` in every asset the address can pay it with.
    pub async fn get_fees(&self, tx: &serde_json::Value) -> BalanceResult<Vec<Money>> {
        self.ready().await?;
        let fee = self.balances.fetch_fee(tx).await?;
        self.convert_fee(fee).map(|conversion| conversion.payable)
    }

    /// Fee of `coins` native units in every asset the address can pay it with.
    pub async fn get_fees_by_amount(&self, coins: u64) -> BalanceResult<Vec<Money>> {
        Ok(self.get_fee_conversion(coins).await?.payable)
    }

    /// Like [`BalanceTracker::get_fees_by_amount`], also reporting the
    /// sponsored assets whose balance does not cover the fee.
    pub async fn get_fee_conversion(&self, coins: u64) -> BalanceResult<FeeConversion> {
        self.ready().await?;
        self.convert_fee(coins)
    }

    pub fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&BalanceSnapshot, &BalanceDiff) + Send + Sync + 'static,
    {
        self.subscribers.on_update(callback)
    }

    /// Remove one subscription, or all of them when `id` is `None`.
    pub fn off_update(&self, id: Option<SubscriptionId>) {
        self.subscribers.off_update(id)
    }

    /// Stop polling and pending retries, and drop every subscriber. A cycle
    /// already running completes but notifies nobody.
    pub fn destroy(&self) {
        info!(address = %self.config.address, "destroying balance tracker");
        self.stop.stop();
        self.subscribers.off_update(None);
        if let Some(scheduler) = lock(&self.scheduler).take() {
            scheduler.stop();
        }
    }

    pub fn state(&self) -> Arc<BalanceState> {
        self.reconciler.state()
    }

    pub fn has_data(&self) -> bool {
        self.reconciler.has_data()
    }

    pub fn health(&self) -> TrackerHealth {
        self.gate.health()
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn get_config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.scheduler).as_ref().is_some_and(PollScheduler::is_running)
    }

    fn convert_fee(&self, coins: u64) -> BalanceResult<FeeConversion> {
        let state = self.reconciler.state();
        let native = state
            .native_asset
            .clone()
            .ok_or_else(|| BalanceError::malformed("native asset not loaded"))?;
        Ok(self.fees.convert_detailed(&state.fee_list, &Money::new(coins, native)))
    }

    fn initial_load(&self) -> SharedLoad {
        let mut current = lock(&self.initial_load);
        // Polling also settles a load whose task finished after every waiter left.
        if let Some(load) = current.as_ref() {
            if !matches!(load.clone().now_or_never(), Some(Err(_))) {
                return load.clone();
            }
        }

        let gate = Arc::clone(&self.gate);
        let stop = self.stop.clone();
        let policy = self.policy;
        let handle = tokio::spawn(async move {
            retry_with_policy(policy, &stop, "initial balance load", || gate.run())
                .await
                .map(|_| ())
        });
        let load = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(BalanceError::fetch(format!("initial load task failed: {e}"))))
        }
        .boxed()
        .shared();

        *current = Some(load.clone());
        load
    }
}

impl Drop for BalanceTracker {
    fn drop(&mut self) {
        if self.is_polling() {
            warn!(address = %self.config.address, "BalanceTracker dropped while polling, stopping");
        }
        self.stop.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for BalanceTracker to make creation more ergonomic
pub struct BalanceTrackerBuilder {
    config: Option<TrackerConfig>,
    balances: Option<Arc<dyn BalanceSource>>,
    assets: Option<Arc<dyn AssetSource>>,
}

impl BalanceTrackerBuilder {
    pub fn new() -> Self {
        Self { config: None, balances: None, assets: None }
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let mut config = self.config.take().unwrap_or_default();
        config.address = address.into();
        self.config = Some(config);
        self
    }

    pub fn with_source<S>(mut self, source: Arc<S>) -> Self
    where
        S: BalanceSource + AssetSource + 'static,
    {
        self.balances = Some(source.clone());
        self.assets = Some(source);
        self
    }

    /// Without an explicit source, balances and assets are read over HTTP.
    pub fn build(self) -> eyre::Result<BalanceTracker> {
        let config = self.config.unwrap_or_else(|| TrackerConfig::from_env().unwrap_or_default());
        config.validate().map_err(|e| eyre::eyre!("Invalid tracker config: {}", e))?;

        let (balances, assets) = match (self.balances, self.assets) {
            (Some(balances), Some(assets)) => (balances, assets),
            _ => {
                let http = Arc::new(HttpSource::from_config(&config)?);
                (http.clone() as Arc<dyn BalanceSource>, http as Arc<dyn AssetSource>)
            }
        };

        Ok(BalanceTracker::with_sources(config, balances, assets))
    }
}

impl Default for BalanceTrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
