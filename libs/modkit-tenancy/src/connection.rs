//! Connection capabilities consumed from the driver, and the bound handle
//! handed to downstream code.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::context::ExecutionContext;
use crate::error::{BoxError, TenancyError};
use crate::tenant::{RequestId, Tenant};

/// Pool-like source of raw connections.
///
/// Pooling, transport and reconnection are entirely the provider's business;
/// the binder only asks for one logical connection per unit of work.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: TenantConnection;

    /// Hand out a single logical connection.
    ///
    /// # Errors
    /// Any failure is reported as
    /// [`TenancyError::ObtainConnection`] by the binder.
    async fn acquire(&self, ctx: &ExecutionContext) -> Result<Self::Connection, BoxError>;
}

/// Raw connection able to run the tenant-switch statement.
#[async_trait]
pub trait TenantConnection: Send + 'static {
    /// Execute `statement` without parameters. The binder bounds the
    /// returned future with a timeout, so it must be cancel-safe in the sense
    /// that dropping it leaves the connection closable.
    ///
    /// # Errors
    /// Returns the driver's rejection (e.g. unknown schema).
    async fn execute(&mut self, statement: &str) -> Result<(), BoxError>;

    /// Close the connection. A tenant-switched connection must not be reused
    /// for another unit of work.
    fn close(self);
}

struct Binding<C: TenantConnection> {
    tenant: Tenant,
    request_id: RequestId,
    conn: Mutex<Option<C>>,
}

impl<C: TenantConnection> Drop for Binding<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            conn.close();
        }
    }
}

/// A raw connection that has already been switched to a tenant.
///
/// Cheap to clone; every clone refers to the same connection. The binding is
/// owned by the registry until released and the connection is closed by the
/// execution wrapper afterwards, after which [`lock`](Self::lock) fails with
/// [`TenancyError::NoConnectionBound`]. If the last handle is dropped while
/// the connection is still open, it is closed then.
pub struct BoundConnection<C: TenantConnection> {
    inner: Arc<Binding<C>>,
}

/// Exclusive access to the bound raw connection.
pub type ConnectionLease<'a, C> = MappedMutexGuard<'a, C>;

impl<C: TenantConnection> Clone for BoundConnection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: TenantConnection> fmt::Debug for BoundConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundConnection")
            .field("tenant", &self.inner.tenant)
            .field("request_id", &self.inner.request_id)
            .finish_non_exhaustive()
    }
}

impl<C: TenantConnection> BoundConnection<C> {
    pub(crate) fn new(tenant: Tenant, request_id: RequestId, conn: C) -> Self {
        Self {
            inner: Arc::new(Binding {
                tenant,
                request_id,
                conn: Mutex::new(Some(conn)),
            }),
        }
    }

    /// Tenant the connection was switched to.
    #[must_use]
    pub fn tenant(&self) -> &Tenant {
        &self.inner.tenant
    }

    /// Identity the binding is registered under.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.inner.request_id
    }

    /// `true` if both handles refer to the same binding.
    #[must_use]
    pub fn same_binding(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wait for exclusive use of the raw connection.
    ///
    /// # Errors
    /// Returns [`TenancyError::NoConnectionBound`] once the connection has
    /// been closed.
    pub async fn lock(&self) -> Result<ConnectionLease<'_, C>, TenancyError> {
        let guard = self.inner.conn.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| TenancyError::NoConnectionBound)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .conn
            .try_lock()
            .is_ok_and(|guard| guard.is_none())
    }

    /// Close without waiting. Returns `false` if a lease is currently held;
    /// the connection is then closed when the last handle goes away.
    pub(crate) fn close_now(&self) -> bool {
        match self.inner.conn.try_lock() {
            Ok(mut guard) => {
                if let Some(conn) = guard.take() {
                    conn.close();
                }
                true
            }
            Err(_) => false,
        }
    }
}
