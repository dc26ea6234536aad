//! Error taxonomy for tenant binding.
//!
//! Every failure of the binding protocol is surfaced as a [`TenancyError`].
//! Transport adapters decide how to render them; this crate never writes a
//! response on its own.

use std::time::Duration;

use thiserror::Error;

use crate::tenant::Tenant;

/// Boxed cause coming from an integrator-supplied collaborator
/// (connection provider, driver, request-identity generator, decider).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, TenancyError>;

/// Errors produced while deciding, binding, or retrieving a tenant connection.
#[derive(Debug, Error)]
pub enum TenancyError {
    /// The decision logic could not determine a tenant for the unit of work.
    #[error("no tenant bound for the context")]
    NoTenantBound,

    /// Retrieval found no live binding for the current request identity.
    ///
    /// Either no binding was performed for the context or the binding has
    /// already been released.
    #[error("no DB connection bound for the context")]
    NoConnectionBound,

    /// Integrator-supplied decision logic failed for another reason.
    #[error("failed to decide tenant: {0}")]
    Decision(#[source] BoxError),

    /// The connection provider failed to hand out a connection.
    #[error("failed to obtain connection: {0}")]
    ObtainConnection(#[source] BoxError),

    /// The tenant-switch statement failed or did not finish in time.
    #[error("failed to change tenant to {tenant}: {cause}")]
    ChangeTenant {
        tenant: Tenant,
        #[source]
        cause: ChangeTenantCause,
    },

    /// The request-identity generator failed.
    #[error("failed to generate request ID: {0}")]
    GenerateRequestId(#[source] BoxError),
}

impl TenancyError {
    /// Wrap an arbitrary decision failure.
    #[must_use]
    pub fn decision(cause: impl Into<BoxError>) -> Self {
        Self::Decision(cause.into())
    }

    #[must_use]
    pub fn is_no_tenant_bound(&self) -> bool {
        matches!(self, Self::NoTenantBound)
    }

    #[must_use]
    pub fn is_no_connection_bound(&self) -> bool {
        matches!(self, Self::NoConnectionBound)
    }

    /// `true` when a tenant switch was abandoned because its deadline passed.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self,
            Self::ChangeTenant {
                cause: ChangeTenantCause::DeadlineExceeded(_),
                ..
            }
        )
    }

    /// Tenant the failed switch was targeting, if this is a switch failure.
    #[must_use]
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            Self::ChangeTenant { tenant, .. } => Some(tenant),
            _ => None,
        }
    }
}

/// Why a tenant-switch statement did not succeed.
#[derive(Debug, Error)]
pub enum ChangeTenantCause {
    /// The statement did not complete within the bind timeout.
    #[error("context deadline exceeded after {}", humantime::format_duration(*.0))]
    DeadlineExceeded(Duration),

    /// The execution context was cancelled while the statement was in flight.
    #[error("context cancelled")]
    Cancelled,

    /// The driver rejected the statement (e.g. unknown schema).
    #[error(transparent)]
    Driver(BoxError),
}
