use crate::data_sync::reconciler::BalanceReconciler;
use crate::error::{BalanceError, BalanceResult};
use crate::logic::types::BalanceDiff;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub type CycleOutcome = BalanceResult<Option<BalanceDiff>>;
type SharedCycle = Shared<BoxFuture<'static, CycleOutcome>>;

/// Callback fed with the outcome of every successful polling cycle.
pub type ResultCallback = Arc<dyn Fn(Option<&BalanceDiff>) + Send + Sync>;

/// How failed operations are repeated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait between attempts.
    pub delay: Duration,
    /// Total attempts including the first; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn forever(delay: Duration) -> Self {
        Self { delay, max_attempts: None }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self { delay, max_attempts: Some(max_attempts.max(1)) }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(Duration::from_millis(crate::constants::DEFAULT_RETRY_DELAY_MS))
    }
}

/// Cooperative stop flag shared by the poll loop and every retry loop.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once stopped.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `delay`; returns `false` if stopped in the meantime.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = sleep(delay) => !self.is_stopped(),
            _ = self.stopped() => false,
        }
    }
}

/// Failure bookkeeping of the refresh cycles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerHealth {
    pub has_data: bool,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<BalanceError>,
}

impl TrackerHealth {
    /// Failing now, whether or not an older snapshot is still available.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Lets at most one reconciliation run at a time. Whoever triggers a cycle
/// while one is running gets that cycle's outcome instead of a new cycle.
pub struct CycleGate {
    reconciler: Arc<BalanceReconciler>,
    current: Mutex<Option<SharedCycle>>,
    health: Arc<StdMutex<TrackerHealth>>,
    started: AtomicU64,
}

impl CycleGate {
    pub fn new(reconciler: Arc<BalanceReconciler>) -> Self {
        Self {
            reconciler,
            current: Mutex::new(None),
            health: Arc::new(StdMutex::new(TrackerHealth::default())),
            started: AtomicU64::new(0),
        }
    }

    pub fn reconciler(&self) -> &Arc<BalanceReconciler> {
        &self.reconciler
    }

    /// Join the running cycle, or start one if none is running.
    pub async fn run(&self) -> CycleOutcome {
        let cycle = {
            let mut current = self.current.lock().await;
            // Polling resolves a cycle whose task ended after every waiter left,
            // so a finished cycle is never joined again.
            match current.as_ref() {
                Some(cycle) if cycle.clone().now_or_never().is_none() => cycle.clone(),
                _ => {
                    let cycle = self.start_cycle();
                    *current = Some(cycle.clone());
                    cycle
                }
            }
        };
        cycle.await
    }

    /// Number of cycles actually started.
    pub fn cycles_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> TrackerHealth {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner).clone();
        health.has_data = self.reconciler.has_data();
        health
    }

    // Spawned so the cycle finishes even if every caller stops waiting.
    fn start_cycle(&self) -> SharedCycle {
        let cycle = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        let reconciler = Arc::clone(&self.reconciler);
        let health = Arc::clone(&self.health);

        let handle = tokio::spawn(async move {
            debug!(cycle, "balance cycle started");
            let outcome = reconciler.reconcile().await;
            let mut health = health.lock().unwrap_or_else(PoisonError::into_inner);
            health.cycles = cycle;
            match &outcome {
                Ok(_) => {
                    health.consecutive_failures = 0;
                    health.last_error = None;
                }
                Err(e) => {
                    health.consecutive_failures = health.consecutive_failures.saturating_add(1);
                    health.last_error = Some(e.clone());
                }
            }
            outcome
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(BalanceError::fetch(format!("balance cycle task failed: {e}"))))
        }
        .boxed()
        .shared()
    }
}

/// Repeat `attempt` under `policy` until it succeeds, the policy gives up,
/// the error is not retryable, or `stop` fires.
pub async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    stop: &StopSignal,
    what: &str,
    mut attempt: F,
) -> BalanceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BalanceResult<T>>,
{
    let mut attempts = 0u32;
    loop {
        if stop.is_stopped() {
            return Err(BalanceError::Cancelled);
        }
        attempts = attempts.saturating_add(1);

        let e = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !e.is_retryable() {
            return Err(e);
        }
        if !policy.allows_retry(attempts) {
            error!(attempts, "{} failed, giving up: {}", what, e);
            return Err(e);
        }

        warn!(attempt = attempts, delay_ms = policy.delay.as_millis() as u64, "{} failed, retrying: {}", what, e);
        if !stop.sleep(policy.delay).await {
            return Err(BalanceError::Cancelled);
        }
    }
}

/// Drives refresh cycles on a fixed interval until stopped.
///
/// Failures are logged and the loop keeps going; the interval is applied
/// after every cycle whatever its outcome.
pub struct PollScheduler {
    gate: Arc<CycleGate>,
    interval: Duration,
    stop: StopSignal,
    on_result: Option<ResultCallback>,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(gate: Arc<CycleGate>, interval: Duration, stop: StopSignal) -> Self {
        Self { gate, interval, stop, on_result: None, handle: None }
    }

    pub fn with_on_result<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&BalanceDiff>) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(callback));
        self
    }

    pub fn start(&mut self) {
        if self.is_running() {
            warn!("poll scheduler already running");
            return;
        }

        let gate = Arc::clone(&self.gate);
        let interval = self.interval;
        let stop = self.stop.clone();
        let on_result = self.on_result.clone();

        info!(interval_ms = interval.as_millis() as u64, "balance polling started");
        self.handle = Some(tokio::spawn(async move {
            loop {
                if stop.is_stopped() {
                    break;
                }
                match gate.run().await {
                    Ok(diff) => {
                        if let Some(callback) = &on_result {
                            callback(diff.as_ref());
                        }
                    }
                    Err(e) => warn!("balance poll cycle failed: {}", e),
                }
                if !stop.sleep(interval).await {
                    break;
                }
            }
            info!("balance polling stopped");
        }));
    }

    /// Prevent the next cycle from starting. A cycle already running completes.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the loop task to exit after [`PollScheduler::stop`].
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("poll task error during shutdown: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NATIVE_ASSET_ID;
    use crate::data_sync::mock_source::MockSource;
    use crate::data_sync::subscriptions::SubscriptionRegistry;
    use crate::utils::asset::Asset;
    use crate::utils::asset_cache::AssetCache;
    use std::sync::atomic::AtomicUsize;

    fn gate_with(source: &Arc<MockSource>) -> Arc<CycleGate> {
        source.add_asset(Asset::builder(NATIVE_ASSET_ID).build());
        source.set_native_balance(10);
        let reconciler = Arc::new(BalanceReconciler::new(
            "3PAddress",
            source.clone(),
            AssetCache::new(source.clone()),
            Arc::new(SubscriptionRegistry::new()),
        ));
        Arc::new(CycleGate::new(reconciler))
    }

    #[test]
    fn test_retry_policy_bounds() {
        let forever = RetryPolicy::forever(Duration::from_millis(1));
        assert!(forever.allows_retry(u32::MAX - 1));

        let bounded = RetryPolicy::bounded(Duration::from_millis(1), 3);
        assert!(bounded.allows_retry(1));
        assert!(bounded.allows_retry(2));
        assert!(!bounded.allows_retry(3));

        assert_eq!(RetryPolicy::bounded(Duration::ZERO, 0).max_attempts, Some(1));
        assert_eq!(RetryPolicy::default().delay, Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn test_concurrent_triggers_share_one_cycle() {
        let source = Arc::new(MockSource::new());
        source.set_latency(Duration::from_millis(50));
        let gate = gate_with(&source);

        let (a, b, c) = tokio::join!(gate.run(), gate.run(), gate.run());
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!(c.unwrap().is_some());

        assert_eq!(gate.cycles_started(), 1);
        assert_eq!(source.balance_fetches(), 1);

        // Once finished, the next trigger starts a fresh cycle.
        assert!(gate.run().await.unwrap().is_none());
        assert_eq!(gate.cycles_started(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_cycle_is_not_joined_again() {
        let source = Arc::new(MockSource::new());
        let gate = gate_with(&source);
        gate.run().await.unwrap();

        source.set_latency(Duration::from_millis(30));
        assert!(tokio::time::timeout(Duration::from_millis(5), gate.run()).await.is_err());
        sleep(Duration::from_millis(80)).await;
        assert_eq!(source.balance_fetches(), 2);

        source.set_native_balance(11);
        let changes = gate.run().await.unwrap().unwrap();
        assert_eq!(changes[NATIVE_ASSET_ID].get_coins(), 11);
        assert_eq!(source.balance_fetches(), 3);
        assert_eq!(gate.cycles_started(), 3);
    }

    #[tokio::test]
    async fn test_health_tracks_failures() {
        let source = Arc::new(MockSource::new());
        let gate = gate_with(&source);

        source.fail_balance_fetches(2);
        assert!(gate.run().await.is_err());
        assert!(gate.run().await.is_err());
        let health = gate.health();
        assert!(health.is_degraded());
        assert_eq!(health.consecutive_failures, 2);
        assert!(!health.has_data);

        gate.run().await.unwrap();
        let health = gate.health();
        assert!(!health.is_degraded());
        assert!(health.has_data);
        assert_eq!(health.cycles, 3);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let source = Arc::new(MockSource::new());
        let gate = gate_with(&source);
        source.fail_balance_fetches(3);

        let stop = StopSignal::new();
        let policy = RetryPolicy::forever(Duration::from_millis(5));
        let outcome = retry_with_policy(policy, &stop, "refresh", || gate.run()).await;

        assert!(outcome.unwrap().is_some());
        assert_eq!(source.balance_fetches(), 4);
    }

    #[tokio::test]
    async fn test_bounded_retry_gives_up() {
        let calls = AtomicUsize::new(0);
        let stop = StopSignal::new();
        let policy = RetryPolicy::bounded(Duration::from_millis(1), 3);

        let outcome: BalanceResult<()> = retry_with_policy(policy, &stop, "health check", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BalanceError::fetch("down")) }
        })
        .await;

        assert_eq!(outcome, Err(BalanceError::fetch("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stop_interrupts_retry_delay() {
        let stop = StopSignal::new();
        let policy = RetryPolicy::forever(Duration::from_secs(3600));
        let stopper = stop.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            stopper.stop();
        });

        let outcome: BalanceResult<()> =
            retry_with_policy(policy, &stop, "health check", || async { Err(BalanceError::fetch("down")) }).await;
        assert_eq!(outcome, Err(BalanceError::Cancelled));
    }

    #[tokio::test]
    async fn test_poll_loop_survives_failures_and_stops() {
        let source = Arc::new(MockSource::new());
        let gate = gate_with(&source);
        source.fail_balance_fetches(2);

        let results = Arc::new(AtomicUsize::new(0));
        let counter = results.clone();
        let stop = StopSignal::new();
        let mut scheduler = PollScheduler::new(gate.clone(), Duration::from_millis(10), stop.clone())
            .with_on_result(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        scheduler.start();
        assert!(scheduler.is_running());
        sleep(Duration::from_millis(150)).await;
        scheduler.stop();
        scheduler.join().await;

        assert!(!scheduler.is_running());
        assert!(gate.health().has_data);
        assert!(results.load(Ordering::SeqCst) >= 1);

        let cycles = source.balance_fetches();
        assert!(cycles >= 3);
        sleep(Duration::from_millis(40)).await;
        assert_eq!(source.balance_fetches(), cycles);
        assert_eq!(source.max_concurrent_balance_fetches(), 1);
    }
}
