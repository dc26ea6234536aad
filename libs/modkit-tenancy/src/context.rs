use tokio_util::sync::CancellationToken;

use crate::tenant::{RequestId, Tenant};

/// Immutable carrier of the tenant and request identity for one unit of work.
///
/// The orchestrator derives a new context (never mutates one) when a binding
/// is established; nested code receives it by value or reference and can
/// reach the bound connection through
/// [`Tenancy::obtain_connection`](crate::Tenancy::obtain_connection) without
/// the connection itself appearing in its signature.
///
/// At most one tenant and one request identity are carried at a time; deriving
/// with a new value shadows the previous one for the derived context only.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    tenant: Option<Tenant>,
    request_id: Option<RequestId>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Empty context: no tenant, no identity, never cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context observing an existing cancellation token (e.g. the host
    /// server's per-request or shutdown token).
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            ..Self::default()
        }
    }

    /// Derive a context carrying `tenant`.
    #[must_use]
    pub fn with_tenant(&self, tenant: Tenant) -> Self {
        Self {
            tenant: Some(tenant),
            ..self.clone()
        }
    }

    /// Derive a context carrying `request_id`.
    #[must_use]
    pub fn with_request_id(&self, request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
