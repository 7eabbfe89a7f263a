/// Opaque, host-supplied per-operation context threaded through to the
/// caller's lookup function. The cache never inspects it; `acquire` uses
/// it only to learn whether the calling thread should stop waiting.
pub trait OperationContext: Send + Sync {
    /// Whether the holder of this context has asked for cancellation.
    /// `acquire`'s blocking wait polls this while parked.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Process-wide object responsible for fabricating a fresh
/// [`OperationContext`] (and an associated client identity) for every unit
/// of work scheduled on the worker pool.
pub trait ServiceContext: Send + Sync {
    fn new_operation_context(&self) -> std::sync::Arc<dyn OperationContext>;
}

/// Trivial [`OperationContext`] that never reports cancellation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOperationContext;

impl OperationContext for NullOperationContext {}

/// Trivial [`ServiceContext`] that hands out [`NullOperationContext`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullServiceContext;

impl ServiceContext for NullServiceContext {
    fn new_operation_context(&self) -> std::sync::Arc<dyn OperationContext> {
        std::sync::Arc::new(NullOperationContext)
    }
}
