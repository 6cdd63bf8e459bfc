use crate::logic::types::{BalanceDiff, BalanceSnapshot};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::error;

/// Callback invoked with the full snapshot and the entries that changed.
pub type UpdateCallback = Arc<dyn Fn(&BalanceSnapshot, &BalanceDiff) + Send + Sync>;

/// Handle returned by [`SubscriptionRegistry::on_update`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct SubscriptionRegistry {
    callbacks: RwLock<Vec<(SubscriptionId, UpdateCallback)>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&BalanceSnapshot, &BalanceDiff) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one subscription, or all of them when `id` is `None`.
    pub fn off_update(&self, id: Option<SubscriptionId>) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        match id {
            Some(id) => callbacks.retain(|(existing, _)| *existing != id),
            None => callbacks.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every subscriber in registration order. A panicking subscriber is
    /// logged and skipped; the rest still run. Returns how many succeeded.
    pub fn dispatch(&self, balances: &BalanceSnapshot, diff: &BalanceDiff) -> usize {
        // Work on a copy so callbacks may (un)subscribe without deadlocking.
        let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner).clone();

        let mut delivered = 0;
        for (id, callback) in &callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(balances, diff))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(subscription = id.0, "balance update subscriber panicked"),
            }
        }
        delivered
    }
}
