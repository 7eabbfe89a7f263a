use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cache::context::OperationContext;
use crate::error::CacheError;

/// `None` means "the backing store has no such key" — a successful,
/// uncached negative. `Some(v)` is a successful fetch.
pub type LookupResult<V> = Result<Option<V>, CacheError>;

/// The caller-supplied blocking-work function that fetches a value for a
/// key from whatever backing store the host owns. Invoked once per retry
/// round on the worker pool, with a freshly created operation context.
///
/// The context is passed by `Arc` rather than by reference so the returned
/// future can be `'static` and run unmoored from the caller's stack frame,
/// which is what letting it execute on a pooled worker thread requires.
pub trait LookupFn<K, V>: Send + Sync {
    fn lookup(&self, key: K, op_ctx: Arc<dyn OperationContext>) -> BoxFuture<'static, LookupResult<V>>;
}

impl<K, V, F, Fut> LookupFn<K, V> for F
where
    F: Fn(K, Arc<dyn OperationContext>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = LookupResult<V>> + Send + 'static,
{
    fn lookup(&self, key: K, op_ctx: Arc<dyn OperationContext>) -> BoxFuture<'static, LookupResult<V>> {
        Box::pin((self)(key, op_ctx))
    }
}
