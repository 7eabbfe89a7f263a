use tokio::sync::watch;

use crate::cache::handle::ValueHandle;
use crate::cache::work_shim::CancelToken;
use crate::error::CacheError;

pub type Outcome<V> = Result<ValueHandle<V>, CacheError>;

/// Per-key state for an active fetch. Every field here is mutated only
/// while the owning cache holds its single mutex — this type carries no
/// synchronization of its own, by design (see the mutex-rank discussion
/// on [`crate::cache::ReadThroughCache`]).
pub struct InProgressLookup<V> {
    valid: bool,
    cancel_token: Option<CancelToken>,
    tx: watch::Sender<Option<Outcome<V>>>,
}

impl<V> InProgressLookup<V> {
    /// Creates a fresh, not-yet-running entry and returns it along with a
    /// receiver the first waiter should hold.
    pub fn new() -> (Self, watch::Receiver<Option<Outcome<V>>>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                valid: false,
                cancel_token: None,
                tx,
            },
            rx,
        )
    }

    pub fn add_waiter(&self) -> watch::Receiver<Option<Outcome<V>>> {
        self.tx.subscribe()
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Called right before scheduling a round: marks the entry valid (the
    /// round about to run is authoritative until proven otherwise) and
    /// records the round's cancel token, replacing any prior one.
    pub fn begin_round(&mut self, token: CancelToken) {
        self.valid = true;
        self.cancel_token = Some(token);
    }

    /// Invalidates the current round and best-effort cancels it. Does not
    /// remove this entry from the in-progress map — the running round, on
    /// completion, observes `valid == false` and retries.
    pub fn invalidate_and_cancel_current_round(&mut self) {
        self.valid = false;
        if let Some(token) = &self.cancel_token {
            token.try_cancel();
        }
    }

    /// Fulfils every waiter's future with `outcome`. Must only be called
    /// after this entry has been detached from the in-progress map.
    pub fn signal_waiters(&self, outcome: Outcome<V>) {
        // A send error means every waiter already dropped its receiver;
        // that is not a contract violation, just nobody left to notify.
        let _ = self.tx.send(Some(outcome));
    }
}
