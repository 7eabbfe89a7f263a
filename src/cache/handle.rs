use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A handle to a value returned by the cache.
///
/// A handle may outlive the entry it was obtained from: once the entry is
/// invalidated, `is_valid` flips to `false` but the value itself remains
/// readable for as long as the handle is held. An absent handle (the
/// backing store reported "no such key") is falsy and has no value.
pub struct ValueHandle<V> {
    value: Option<Arc<V>>,
    update_wall_clock_time: DateTime<Utc>,
    validity: Arc<AtomicBool>,
}

impl<V> ValueHandle<V> {
    pub(crate) fn present(value: Arc<V>, update_wall_clock_time: DateTime<Utc>, validity: Arc<AtomicBool>) -> Self {
        Self {
            value: Some(value),
            update_wall_clock_time,
            validity,
        }
    }

    /// A handle reporting that the backing store had nothing for this key.
    /// Never stored in the LRU store — callers re-invoke lookup next time.
    pub(crate) fn absent() -> Self {
        Self {
            value: None,
            update_wall_clock_time: DateTime::<Utc>::MIN_UTC,
            validity: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wraps a caller-supplied value directly, bypassing lookup entirely.
    /// Always valid; carries the minimum representable timestamp as a
    /// sentinel since no lookup ever produced it.
    pub fn from_value(value: V) -> Self {
        Self {
            value: Some(Arc::new(value)),
            update_wall_clock_time: DateTime::<Utc>::MIN_UTC,
            validity: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the backing store reported a value at all.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the entry this handle was obtained from has since been
    /// invalidated. A present-but-invalid handle still dereferences fine.
    pub fn is_valid(&self) -> bool {
        self.validity.load(Ordering::Acquire)
    }

    pub fn update_wall_clock_time(&self) -> DateTime<Utc> {
        self.update_wall_clock_time
    }

    pub fn get(&self) -> Option<&V> {
        self.value.as_deref()
    }
}

// Manual impl: `Arc<V>` is `Clone` regardless of `V`, but `#[derive(Clone)]`
// would add a spurious `V: Clone` bound.
impl<V> Clone for ValueHandle<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            update_wall_clock_time: self.update_wall_clock_time,
            validity: Arc::clone(&self.validity),
        }
    }
}

impl<V> Deref for ValueHandle<V> {
    type Target = V;

    /// Panics if the handle is absent — callers should check `is_present`
    /// (or use `get`) before dereferencing a handle that may be empty.
    fn deref(&self) -> &V {
        self.value
            .as_deref()
            .expect("dereferenced an absent ValueHandle")
    }
}

