//! Request-identity generation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::error::BoxError;
use crate::tenant::RequestId;

/// Produces a fresh identity for each unit of work that needs a binding.
///
/// Implementations are invoked concurrently from independent units of work.
/// Identities must be unique for as long as they are bound; reusing a live
/// identity displaces the earlier binding in the registry.
pub trait RequestIdGenerator: Send + Sync {
    /// # Errors
    /// Returns an error if no identity can be produced.
    fn generate(&self, ctx: &ExecutionContext) -> Result<RequestId, BoxError>;
}

impl<F> RequestIdGenerator for F
where
    F: Fn(&ExecutionContext) -> Result<RequestId, BoxError> + Send + Sync,
{
    fn generate(&self, ctx: &ExecutionContext) -> Result<RequestId, BoxError> {
        self(ctx)
    }
}

/// Default generator: time-ordered `UUIDv7` strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl RequestIdGenerator for UuidV7Generator {
    fn generate(&self, _ctx: &ExecutionContext) -> Result<RequestId, BoxError> {
        Ok(RequestId::new(Uuid::now_v7().to_string()))
    }
}

/// Prefix plus a process-local counter. Deterministic, intended for tests.
#[derive(Debug, Default)]
pub struct MonotonicGenerator {
    prefix: String,
    next: AtomicU64,
}

impl MonotonicGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Number of identities handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl RequestIdGenerator for MonotonicGenerator {
    fn generate(&self, _ctx: &ExecutionContext) -> Result<RequestId, BoxError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(RequestId::new(format!("{}{n}", self.prefix)))
    }
}
