use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::cache::handle::ValueHandle;
use crate::cache::stored::StoredValue;

/// A read-only snapshot of one entry, returned by `stats()`.
#[derive(Debug, Clone)]
pub struct EntryInfo<K> {
    pub key: K,
    pub update_wall_clock_time: DateTime<Utc>,
    pub valid: bool,
}

/// The invalidating LRU map behind the cache. Internally synchronised so
/// the cache's fast path can read it without taking the cache mutex (rank
/// 0, strictly below the shim's and the cache's own mutexes).
pub trait LruStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<ValueHandle<V>>;
    fn insert_or_assign(&self, key: K, value: StoredValue<V>) -> ValueHandle<V>;
    fn invalidate(&self, key: &K);
    fn invalidate_if(&self, predicate: &dyn Fn(&K) -> bool);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn capacity(&self) -> usize;
    fn stats(&self) -> Vec<EntryInfo<K>>;
}

struct Slot<V> {
    value: Arc<V>,
    update_wall_clock_time: DateTime<Utc>,
    validity: Arc<AtomicBool>,
    recency: AtomicU64,
}

/// Default [`LruStore`] backed by [`DashMap`], whose shards give the
/// internal synchronisation the cache's fast path relies on. Eviction is a
/// plain O(n) scan for the lowest recency counter — trivial compared to
/// the coalescing/invalidation state machine this store merely backs.
pub struct DashMapLruStore<K, V> {
    map: DashMap<K, Slot<V>>,
    capacity: usize,
    clock: AtomicU64,
}

impl<K, V> DashMapLruStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity,
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_one(&self) {
        let mut oldest_key: Option<K> = None;
        let mut oldest_recency = u64::MAX;

        for entry in self.map.iter() {
            let recency = entry.value().recency.load(Ordering::Relaxed);
            if recency < oldest_recency {
                oldest_recency = recency;
                oldest_key = Some(entry.key().clone());
            }
        }

        if let Some(key) = oldest_key {
            if let Some((_, slot)) = self.map.remove(&key) {
                slot.validity.store(false, Ordering::Release);
            }
        }
    }
}

impl<K, V> LruStore<K, V> for DashMapLruStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<ValueHandle<V>> {
        let slot = self.map.get(key)?;
        slot.recency.store(self.tick(), Ordering::Relaxed);
        Some(ValueHandle::present(
            Arc::clone(&slot.value),
            slot.update_wall_clock_time,
            Arc::clone(&slot.validity),
        ))
    }

    fn insert_or_assign(&self, key: K, stored: StoredValue<V>) -> ValueHandle<V> {
        if self.capacity == 0 {
            // Storage disabled: hand back a handle that is immediately
            // stale, satisfying the "coalescing works, storage doesn't"
            // boundary behaviour.
            let validity = Arc::new(AtomicBool::new(false));
            return ValueHandle::present(Arc::new(stored.value), stored.update_wall_clock_time, validity);
        }

        if let Some((_, old)) = self.map.remove(&key) {
            old.validity.store(false, Ordering::Release);
        }

        let validity = Arc::new(AtomicBool::new(true));
        let value = Arc::new(stored.value);
        let slot = Slot {
            value: Arc::clone(&value),
            update_wall_clock_time: stored.update_wall_clock_time,
            validity: Arc::clone(&validity),
            recency: AtomicU64::new(self.tick()),
        };
        self.map.insert(key, slot);

        if self.map.len() > self.capacity {
            self.evict_one();
        }

        ValueHandle::present(value, stored.update_wall_clock_time, validity)
    }

    fn invalidate(&self, key: &K) {
        if let Some((_, slot)) = self.map.remove(key) {
            slot.validity.store(false, Ordering::Release);
        }
    }

    fn invalidate_if(&self, predicate: &dyn Fn(&K) -> bool) {
        let matching: Vec<K> = self
            .map
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in matching {
            self.invalidate(&key);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn stats(&self) -> Vec<EntryInfo<K>> {
        self.map
            .iter()
            .map(|entry| EntryInfo {
                key: entry.key().clone(),
                update_wall_clock_time: entry.value().update_wall_clock_time,
                valid: entry.value().validity.load(Ordering::Acquire),
            })
            .collect()
    }
}
