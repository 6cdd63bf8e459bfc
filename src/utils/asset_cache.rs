use crate::data_sync::source::AssetSource;
use crate::error::{BalanceError, BalanceResult};
use crate::utils::asset::{Asset, AssetWrapper};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type BatchOutcome = BalanceResult<Arc<Vec<Option<AssetWrapper>>>>;
type SharedBatch = Shared<BoxFuture<'static, BatchOutcome>>;

/// A pending batch that an id belongs to, plus the id's position in that batch.
struct InFlightLookup {
    batch_id: u64,
    index: usize,
    lookup: SharedBatch,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Misses served by joining a batch another caller started.
    pub joined: AtomicU64,
    /// Batch requests actually sent to the asset source.
    pub batches: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

struct AssetCacheInner {
    source: Arc<dyn AssetSource>,
    assets: DashMap<String, AssetWrapper>,
    // Serializes the check-then-insert on pending ids.
    in_flight: Mutex<HashMap<String, InFlightLookup>>,
    next_batch_id: AtomicU64,
    stats: CacheStats,
}

/// Asset metadata cache with shared in-flight lookups.
///
/// Resolved assets are kept forever. An id is fetched by at most one batch at
/// a time: callers asking for an id that is already being fetched wait on the
/// same batch instead of sending their own request.
#[derive(Clone)]
pub struct AssetCache {
    inner: Arc<AssetCacheInner>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            inner: Arc::new(AssetCacheInner {
                source,
                assets: DashMap::new(),
                in_flight: Mutex::new(HashMap::new()),
                next_batch_id: AtomicU64::new(0),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Resolve every id, fetching only the ones neither cached nor in flight.
    pub async fn resolve<I, S>(&self, ids: I) -> BalanceResult<HashMap<String, AssetWrapper>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stats = &self.inner.stats;
        let mut resolved = HashMap::new();
        let mut pending: Vec<(String, u64, usize)> = Vec::new();
        let mut batches: HashMap<u64, SharedBatch> = HashMap::new();

        {
            let mut in_flight = self.inner.in_flight.lock().await;
            let mut seen = HashSet::new();
            let mut to_fetch = Vec::new();

            for id in ids {
                let id = id.as_ref();
                if !seen.insert(id.to_string()) {
                    continue;
                }
                if let Some(asset) = self.inner.assets.get(id) {
                    stats.hits.fetch_add(1, Ordering::Relaxed);
                    resolved.insert(id.to_string(), Arc::clone(asset.value()));
                    continue;
                }
                stats.misses.fetch_add(1, Ordering::Relaxed);
                match in_flight.get(id) {
                    Some(entry) => {
                        stats.joined.fetch_add(1, Ordering::Relaxed);
                        pending.push((id.to_string(), entry.batch_id, entry.index));
                        batches.entry(entry.batch_id).or_insert_with(|| entry.lookup.clone());
                    }
                    None => to_fetch.push(id.to_string()),
                }
            }

            if !to_fetch.is_empty() {
                let batch_id = self.inner.next_batch_id.fetch_add(1, Ordering::Relaxed);
                let lookup = Self::start_lookup(Arc::clone(&self.inner), batch_id, to_fetch.clone());
                for (index, id) in to_fetch.into_iter().enumerate() {
                    in_flight.insert(id.clone(), InFlightLookup { batch_id, index, lookup: lookup.clone() });
                    pending.push((id, batch_id, index));
                }
                batches.insert(batch_id, lookup);
            }
        }

        if pending.is_empty() {
            return Ok(resolved);
        }

        let outcomes = join_all(batches.into_iter().map(|(batch_id, lookup)| async move { (batch_id, lookup.await) })).await;
        let mut fetched = HashMap::with_capacity(outcomes.len());
        for (batch_id, outcome) in outcomes {
            fetched.insert(batch_id, outcome?);
        }

        for (id, batch_id, index) in pending {
            let asset = fetched
                .get(&batch_id)
                .and_then(|batch| batch.get(index))
                .and_then(|asset| asset.clone())
                .ok_or_else(|| BalanceError::malformed(format!("asset {id} not returned by the asset service")))?;
            resolved.insert(id, asset);
        }

        Ok(resolved)
    }

    /// Spawn the batch request so it completes even if every waiter goes away.
    fn start_lookup(inner: Arc<AssetCacheInner>, batch_id: u64, ids: Vec<String>) -> SharedBatch {
        let handle = tokio::spawn(Self::run_lookup(inner, batch_id, ids));
        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(BalanceError::fetch(format!("asset lookup task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    async fn run_lookup(inner: Arc<AssetCacheInner>, batch_id: u64, ids: Vec<String>) -> BatchOutcome {
        inner.stats.batches.fetch_add(1, Ordering::Relaxed);
        debug!(batch_id, count = ids.len(), "fetching asset metadata");

        let outcome = inner.source.fetch_assets(&ids).await.and_then(|assets| {
            if assets.len() != ids.len() {
                return Err(BalanceError::malformed(format!(
                    "asked for {} assets, got {}",
                    ids.len(),
                    assets.len()
                )));
            }
            Ok(assets.into_iter().map(|asset| asset.map(Arc::new)).collect::<Vec<_>>())
        });

        // Publish before clearing the in-flight records so there is no window
        // where an id is neither cached nor joinable.
        if let Ok(assets) = &outcome {
            for asset in assets.iter().flatten() {
                inner.assets.insert(asset.get_id().to_string(), Arc::clone(asset));
            }
        }

        {
            let mut in_flight = inner.in_flight.lock().await;
            for id in &ids {
                if in_flight.get(id).is_some_and(|entry| entry.batch_id == batch_id) {
                    in_flight.remove(id);
                }
            }
        }

        match outcome {
            Ok(assets) => Ok(Arc::new(assets)),
            Err(e) => {
                warn!(batch_id, count = ids.len(), "asset metadata fetch failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<AssetWrapper> {
        self.inner.assets.get(id).map(|asset| Arc::clone(asset.value()))
    }

    /// Seed the cache with a locally known asset.
    pub fn insert(&self, asset: Asset) -> AssetWrapper {
        let asset = Arc::new(asset);
        self.inner.assets.insert(asset.get_id().to_string(), Arc::clone(&asset));
        asset
    }

    pub fn len(&self) -> usize {
        self.inner.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.assets.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Drop resolved assets; lookups already in flight are left alone.
    pub fn clear(&self) {
        self.inner.assets.clear();
    }
}
