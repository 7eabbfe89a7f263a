use std::fmt;
use std::sync::Arc;

/// Errors surfaced by the cache to callers.
///
/// Mirrors the plain-enum-plus-`Display` idiom this crate's ambient error
/// types use elsewhere rather than deriving from a macro crate.
#[derive(Debug, Clone)]
pub enum CacheError {
    /// The lookup was cancelled before it could run to completion, and the
    /// retry loop decided not to absorb the cancellation with another
    /// round (see the short-circuit rule in the retry algorithm).
    Cancelled,
    /// The caller-supplied lookup function returned an error.
    LookupFailed(Arc<anyhow::Error>),
    /// An internal invariant was violated. These are bugs, not expected
    /// runtime conditions, and callers should treat them as fatal.
    ContractViolation(&'static str),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Cancelled => write!(f, "lookup was cancelled"),
            CacheError::LookupFailed(err) => write!(f, "lookup failed: {err}"),
            CacheError::ContractViolation(msg) => write!(f, "cache contract violation: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::LookupFailed(err) => Some(err.as_ref().as_ref()),
            _ => None,
        }
    }
}

impl CacheError {
    /// Whether this error is the distinguished cancellation code the retry
    /// loop checks by identity rather than by inspecting the message.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled)
    }

    pub fn lookup_failed(err: anyhow::Error) -> Self {
        CacheError::LookupFailed(Arc::new(err))
    }
}
