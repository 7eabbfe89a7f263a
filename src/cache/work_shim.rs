use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::cache::context::ServiceContext;
use crate::cache::lookup::{LookupFn, LookupResult};
use crate::cache::worker_pool::WorkerPool;
use crate::error::CacheError;

/// Handle returned by [`WorkShim::schedule`] letting the caller attempt to
/// cancel a unit of work before it starts executing.
///
/// Guarded by its own mutex-free `AtomicBool` rather than the cache mutex —
/// this is the shim's rank-2 synchronization, strictly below the cache's
/// rank-3 mutex, so invalidation never blocks on work completion.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: Arc::clone(&flag),
            },
            flag,
        )
    }

    /// Attempts to cancel the associated unit of work.
    ///
    /// If the work has not yet begun executing, its callback is invoked
    /// with [`CacheError::Cancelled`] instead of running the lookup. If the
    /// work has already begun (or finished), this has no effect on the
    /// work itself — only a pre-execution cancellation is supported.
    pub fn try_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Wraps a [`WorkerPool`] with the two capabilities a plain pool does not
/// offer: a fresh operation context per unit of work, and pre-execution
/// cancellation delivered through a callback rather than by interrupting
/// arbitrary running code.
pub struct WorkShim<P> {
    pool: Arc<P>,
    service_ctx: Arc<dyn ServiceContext>,
}

impl<P: WorkerPool> WorkShim<P> {
    pub fn new(pool: Arc<P>, service_ctx: Arc<dyn ServiceContext>) -> Self {
        Self { pool, service_ctx }
    }

    /// Schedules one lookup round. Returns a cancel token and a future that
    /// resolves exactly once, either with the lookup's result or with
    /// [`CacheError::Cancelled`].
    pub fn schedule<K, V>(
        &self,
        lookup: Arc<dyn LookupFn<K, V>>,
        key: K,
    ) -> (CancelToken, oneshot::Receiver<LookupResult<V>>)
    where
        K: Send + 'static,
        V: Send + 'static,
    {
        let (token, cancelled) = CancelToken::new();
        let (tx, rx) = oneshot::channel();
        let service_ctx = Arc::clone(&self.service_ctx);

        self.pool.execute(Box::new(move || {
            if cancelled.load(Ordering::Acquire) {
                let _ = tx.send(Err(CacheError::Cancelled));
                return;
            }

            let op_ctx = service_ctx.new_operation_context();
            let result = futures::executor::block_on(lookup.lookup(key, op_ctx));
            let _ = tx.send(result);
        }));

        (token, rx)
    }
}
