use chrono::{DateTime, Utc};

/// Time source consumed by the cache when stamping freshly fetched values.
///
/// Kept behind a trait so tests can substitute a controllable clock instead
/// of real wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
