use chrono::{DateTime, Utc};

/// A value as it sits at rest in the LRU store.
///
/// `update_wall_clock_time` is diagnostic only — never used internally for
/// ordering or recency decisions.
#[derive(Debug, Clone)]
pub struct StoredValue<V> {
    pub value: V,
    pub update_wall_clock_time: DateTime<Utc>,
}

impl<V> StoredValue<V> {
    pub fn new(value: V, update_wall_clock_time: DateTime<Utc>) -> Self {
        Self {
            value,
            update_wall_clock_time,
        }
    }
}
