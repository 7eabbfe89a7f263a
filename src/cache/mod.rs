//! Read-through cache with coalesced asynchronous lookups and
//! barrier-style invalidation.
//!
//! See [`ReadThroughCache`] for the public surface; the coalescing and
//! invalidation state machine lives in [`in_progress`].

pub mod clock;
pub mod context;
pub mod handle;
pub mod in_progress;
pub mod lookup;
pub mod lru_store;
pub mod stored;
pub mod work_shim;
pub mod worker_pool;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use clock::{Clock, SystemClock};
pub use context::{NullOperationContext, NullServiceContext, OperationContext, ServiceContext};
pub use handle::ValueHandle;
pub use lookup::{LookupFn, LookupResult};
pub use lru_store::{DashMapLruStore, EntryInfo, LruStore};
pub use stored::StoredValue;
pub use worker_pool::{SimpleThreadPool, WorkerPool};

use in_progress::InProgressLookup;
use work_shim::WorkShim;

use crate::error::CacheError;

pub type Outcome<V> = Result<ValueHandle<V>, CacheError>;

/// Hit/miss/invalidation counters exposed by [`ReadThroughCache::metrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
    fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
    fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

struct Inner<K, V, L, P> {
    lru: Arc<L>,
    in_progress: StdMutex<HashMap<K, InProgressLookup<V>>>,
    shim: WorkShim<P>,
    lookup_fn: Arc<dyn LookupFn<K, V>>,
    clock: Arc<dyn Clock>,
    stats: Counters,
    /// Accepted for interface fidelity with the constructor signature a
    /// host subclass provides (latch diagnostics); never locked by the
    /// cache's own synchronization.
    _latch_diagnostics: Arc<StdMutex<()>>,
}

/// A read-through cache: fetches through a caller-supplied lookup function
/// on a miss, coalescing concurrent misses for the same key into a single
/// in-flight fetch, and restarting that fetch whenever an invalidation
/// lands while it is still running.
pub struct ReadThroughCache<K, V, L = DashMapLruStore<K, V>, P = SimpleThreadPool> {
    inner: Arc<Inner<K, V, L, P>>,
}

impl<K, V, L, P> Clone for ReadThroughCache<K, V, L, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> ReadThroughCache<K, V, DashMapLruStore<K, V>, SimpleThreadPool>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Convenience constructor wiring up the default LRU store and thread
    /// pool. `capacity == 0` disables storage while coalescing still works.
    pub fn new(
        lookup_fn: impl LookupFn<K, V> + 'static,
        capacity: usize,
        worker_count: usize,
    ) -> Self {
        Self::with_components(
            Arc::new(StdMutex::new(())),
            Arc::new(NullServiceContext),
            Arc::new(SimpleThreadPool::new(worker_count)),
            Arc::new(DashMapLruStore::new(capacity)),
            Arc::new(SystemClock),
            lookup_fn,
        )
    }
}

impl<K, V, L, P> ReadThroughCache<K, V, L, P>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    L: LruStore<K, V> + 'static,
    P: WorkerPool + 'static,
{
    /// Full constructor taking every external collaborator named in the
    /// component design: a host-supplied latch-diagnostics mutex, a
    /// service context, a thread pool, an LRU store, a time source, and
    /// the lookup function.
    pub fn with_components(
        latch_diagnostics: Arc<StdMutex<()>>,
        service_ctx: Arc<dyn ServiceContext>,
        pool: Arc<P>,
        lru: Arc<L>,
        clock: Arc<dyn Clock>,
        lookup_fn: impl LookupFn<K, V> + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                lru,
                in_progress: StdMutex::new(HashMap::new()),
                shim: WorkShim::new(pool, service_ctx),
                lookup_fn: Arc::new(lookup_fn),
                clock,
                stats: Counters::default(),
                _latch_diagnostics: latch_diagnostics,
            }),
        }
    }

    /// Resolves to a valid handle, an absent handle, or an error. Never
    /// invokes the lookup function more than once per concurrent wave of
    /// callers for the same key.
    pub async fn acquire_async(&self, key: K) -> Outcome<V> {
        if let Some(handle) = self.inner.lru.get(&key) {
            if handle.is_valid() {
                self.inner.stats.record_hit();
                return Ok(handle);
            }
        }

        let mut created = false;
        let mut rx = {
            let mut guard = self
                .inner
                .in_progress
                .lock()
                .expect("cache mutex poisoned");

            // The fast-path check above ran lock-free; re-check now that
            // we hold the mutex in case an insert raced in.
            if let Some(handle) = self.inner.lru.get(&key) {
                if handle.is_valid() {
                    self.inner.stats.record_hit();
                    return Ok(handle);
                }
            }
            self.inner.stats.record_miss();

            if let Some(entry) = guard.get(&key) {
                entry.add_waiter()
            } else {
                let (entry, rx) = InProgressLookup::new();
                guard.insert(key.clone(), entry);
                created = true;
                rx
            }
        };

        if created {
            let inner = Arc::clone(&self.inner);
            let key_for_task = key.clone();
            tokio::spawn(async move {
                run_rounds(inner, key_for_task).await;
            });
        }

        loop {
            if rx.changed().await.is_err() {
                return Err(CacheError::ContractViolation(
                    "in-progress lookup was dropped without signalling its waiters",
                ));
            }
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
        }
    }

    /// Blocking-style wrapper around [`acquire_async`](Self::acquire_async)
    /// that polls `op_ctx` for cancellation while waiting.
    pub async fn acquire(&self, op_ctx: Arc<dyn OperationContext>, key: K) -> Outcome<V> {
        let mut fut = Box::pin(self.acquire_async(key));
        loop {
            tokio::select! {
                biased;
                result = &mut fut => return result,
                () = tokio::time::sleep(Duration::from_millis(20)) => {
                    if op_ctx.is_cancelled() {
                        return Err(CacheError::Cancelled);
                    }
                }
            }
        }
    }

    /// Invalidates any in-flight round for `key` and unconditionally
    /// writes `value` into the LRU store. The write is immediately visible
    /// to a fresh `acquire_async`; the best-effort-cancelled round, if it
    /// was already running, resolves its own waiters through a retry
    /// rather than through this write (see the design ledger).
    pub fn insert_or_assign(&self, key: K, value: V, timestamp: DateTime<Utc>) -> ValueHandle<V> {
        {
            let mut guard = self
                .inner
                .in_progress
                .lock()
                .expect("cache mutex poisoned");
            if let Some(entry) = guard.get_mut(&key) {
                entry.invalidate_and_cancel_current_round();
            }
        }

        self.inner
            .lru
            .insert_or_assign(key, StoredValue::new(value, timestamp))
    }

    pub fn invalidate(&self, key: &K) {
        {
            let mut guard = self
                .inner
                .in_progress
                .lock()
                .expect("cache mutex poisoned");
            if let Some(entry) = guard.get_mut(key) {
                entry.invalidate_and_cancel_current_round();
            }
        }
        self.inner.lru.invalidate(key);
        self.inner.stats.record_invalidation();
    }

    pub fn invalidate_if(&self, predicate: impl Fn(&K) -> bool) {
        {
            let mut guard = self
                .inner
                .in_progress
                .lock()
                .expect("cache mutex poisoned");
            for (k, entry) in guard.iter_mut() {
                if predicate(k) {
                    entry.invalidate_and_cancel_current_round();
                }
            }
        }
        self.inner.lru.invalidate_if(&predicate);
        self.inner.stats.record_invalidation();
    }

    pub fn invalidate_all(&self) {
        self.invalidate_if(|_| true);
    }

    /// Aggregate hit/miss/invalidation counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.inner.stats.snapshot()
    }

    /// Zeroes the hit/miss/invalidation counters. Does not touch the LRU
    /// store or any in-flight lookup.
    pub fn reset_metrics(&self) {
        self.inner.stats.reset();
    }

    /// Read-only per-entry snapshot of the LRU store.
    pub fn stats(&self) -> Vec<EntryInfo<K>> {
        self.inner.lru.stats()
    }

    /// Asserts the destruction precondition: no lookups outstanding.
    /// Hosts should shut down their worker pool (draining in-flight work)
    /// before dropping the cache; calling this beforehand surfaces a
    /// violation instead of leaving it to manifest as a stuck future.
    pub fn assert_quiescent(&self) -> Result<(), CacheError> {
        let guard = self
            .inner
            .in_progress
            .lock()
            .expect("cache mutex poisoned");
        if guard.is_empty() {
            Ok(())
        } else {
            Err(CacheError::ContractViolation(
                "cache destroyed with lookups still in progress",
            ))
        }
    }
}

/// One [`InProgressLookup`]'s whole lifetime: schedule a round, wait for
/// it, then either retry or detach and signal waiters. Structured as a
/// single spawned task per key rather than the recursive retry described
/// narratively in the component design — semantically identical, and the
/// idiomatic way to express "a retriable worker loop" in `tokio`.
async fn run_rounds<K, V, L, P>(inner: Arc<Inner<K, V, L, P>>, key: K)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    L: LruStore<K, V> + 'static,
    P: WorkerPool + 'static,
{
    loop {
        let round_rx = {
            let mut guard = inner.in_progress.lock().expect("cache mutex poisoned");
            let entry = guard.get_mut(&key).unwrap_or_else(|| {
                panic!("contract violation: in-progress entry missing while scheduling a round")
            });
            let (token, round_rx) = inner
                .shim
                .schedule(Arc::clone(&inner.lookup_fn), key.clone());
            entry.begin_round(token);
            round_rx
        };

        let round_outcome: LookupResult<V> = match round_rx.await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Cancelled),
        };

        let mut guard = inner.in_progress.lock().expect("cache mutex poisoned");
        let still_valid = guard
            .get(&key)
            .unwrap_or_else(|| {
                panic!("contract violation: in-progress entry missing while observing a round's outcome")
            })
            .valid();

        let is_cancel_error = matches!(&round_outcome, Err(e) if e.is_cancelled());

        if !is_cancel_error && !still_valid {
            // Invalidated mid-flight and not a cancellation error: retry.
            drop(guard);
            continue;
        }

        let entry = guard.remove(&key).unwrap_or_else(|| {
            panic!("contract violation: in-progress entry vanished before detach")
        });

        let outcome: Outcome<V> = match round_outcome {
            Ok(Some(value)) => {
                let stored = StoredValue::new(value, inner.clock.now());
                Ok(inner.lru.insert_or_assign(key.clone(), stored))
            }
            Ok(None) => Ok(ValueHandle::absent()),
            Err(e) => Err(e),
        };

        // Detach (above) and insert (above) happened as one critical
        // section; waiters are signalled only after the mutex is released.
        drop(guard);
        entry.signal_waiters(outcome);
        return;
    }
}
