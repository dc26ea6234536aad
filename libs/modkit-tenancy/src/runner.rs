//! Execution wrapper: decide, bind, run the unit of work, tear down.
//!
//! ```text
//! Decide ──NoChange──────────────────────────────► Invoke(original ctx) ─► Done
//!    │
//!    ├──Error(e)───────────────────────────────────► Fail(e)
//!    │
//!    └──ChangeTo(t) ─► GenerateID ─► Bind ─► Invoke(derived ctx) ─► Cleanup ─► Done
//!                          │           │
//!                          └───────────┴─────────► Fail
//! ```
//!
//! Cleanup (release the registry entry, then close the connection) runs
//! exactly once per successful bind: on normal return, on the unit of work's
//! error, on panic, and when the returned future is dropped mid-flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BindOptions;
use crate::connection::{BoundConnection, ConnectionProvider, TenantConnection};
use crate::context::ExecutionContext;
use crate::decision::{TenantDecider, TenantDecision};
use crate::error::TenancyError;
use crate::registry::ConnectionRegistry;
use crate::request_id::RequestIdGenerator;
use crate::tenancy::Tenancy;
use crate::tenant::RequestId;

/// Inputs of one [`Tenancy::run`] call.
///
/// Without an explicit decision the run fails with
/// [`TenancyError::NoTenantBound`] and the unit of work is not invoked.
#[derive(Default)]
pub struct RunOptions {
    decision: Option<TenantDecision>,
    id_generator: Option<Arc<dyn RequestIdGenerator>>,
    bind: BindOptions,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn decision(mut self, decision: TenantDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Ask `decider` about `input` now and use its answer.
    #[must_use]
    pub fn decide<I, D>(self, decider: &D, input: &I) -> Self
    where
        I: ?Sized,
        D: TenantDecider<I> + ?Sized,
    {
        self.decision(decider.decide(input))
    }

    /// Override the tenancy-wide request-identity generator for this run.
    #[must_use]
    pub fn id_generator(mut self, generator: Arc<dyn RequestIdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn change_tenant_timeout(mut self, timeout: Duration) -> Self {
        self.bind.change_tenant_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn bind_options(mut self, bind: BindOptions) -> Self {
        self.bind = bind;
        self
    }
}

impl<P: ConnectionProvider> Tenancy<P> {
    /// Run `unit` under the tenant selected by `options`, returning its value.
    ///
    /// - `NoChange`: `unit` runs once with `ctx` untouched; nothing is bound.
    /// - `Error(e)`: returns `e`; `unit` never runs.
    /// - `ChangeTo(tenant)`: generates a request identity, binds a connection
    ///   and runs `unit` with a context carrying the tenant and identity.
    ///   The binding is released and its connection closed afterwards,
    ///   whatever `unit` returns. Teardown does not wait for leases taken
    ///   by tasks `unit` spawned; a connection still leased there is closed
    ///   when its last [`BoundConnection`] handle is dropped.
    ///
    /// `unit`'s own error is passed through unchanged; protocol failures are
    /// converted with `E::from`. Nothing is retried.
    ///
    /// # Errors
    /// The decision error, [`TenancyError::GenerateRequestId`], any
    /// [`Tenancy::bind`] error, or the error returned by `unit`.
    pub async fn yield_with<T, E, F, Fut>(
        &self,
        ctx: ExecutionContext,
        options: RunOptions,
        unit: F,
    ) -> Result<T, E>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TenancyError>,
    {
        let RunOptions {
            decision,
            id_generator,
            bind,
        } = options;

        let tenant = match decision.unwrap_or_else(TenantDecision::no_tenant_bound) {
            TenantDecision::NoChange => {
                tracing::debug!("no tenant change; running without binding");
                return unit(ctx).await;
            }
            TenantDecision::Error(err) => {
                tracing::debug!(error = %err, "tenant decision failed");
                return Err(E::from(err));
            }
            TenantDecision::ChangeTo(tenant) => tenant,
        };

        let generator = id_generator.as_ref().unwrap_or_else(|| self.id_generator());
        let request_id = generator
            .generate(&ctx)
            .map_err(|e| E::from(TenancyError::GenerateRequestId(e)))?;

        let bound_ctx = ctx
            .with_tenant(tenant.clone())
            .with_request_id(request_id.clone());
        let bound = self.bind(&bound_ctx, &tenant, &bind).await?;

        let guard = BindingGuard::new(self.registry(), request_id, bound);
        let out = unit(bound_ctx).await;
        guard.finish();
        out
    }

    /// [`Tenancy::yield_with`] for units of work that produce no value.
    ///
    /// # Errors
    /// See [`Tenancy::yield_with`].
    pub async fn run<E, F, Fut>(
        &self,
        ctx: ExecutionContext,
        options: RunOptions,
        unit: F,
    ) -> Result<(), E>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<TenancyError>,
    {
        self.yield_with(ctx, options, unit).await
    }
}

/// Scope guard armed right after a successful bind.
///
/// `finish` performs the orderly teardown; `Drop` covers panics and
/// cancellation of the enclosing future. Neither waits for a lease held
/// elsewhere: such a connection is closed when its last handle goes away.
struct BindingGuard<'a, C: TenantConnection> {
    registry: &'a ConnectionRegistry<C>,
    request_id: RequestId,
    bound: Option<BoundConnection<C>>,
}

impl<'a, C: TenantConnection> BindingGuard<'a, C> {
    fn new(
        registry: &'a ConnectionRegistry<C>,
        request_id: RequestId,
        bound: BoundConnection<C>,
    ) -> Self {
        Self {
            registry,
            request_id,
            bound: Some(bound),
        }
    }

    fn finish(mut self) {
        if let Some(closed) = self.teardown() {
            tracing::debug!(request_id = %self.request_id, closed, "tenant binding released");
        }
    }

    /// Release our own registry entry, then close. Returns whether the
    /// connection was closed right away, or `None` if already torn down.
    fn teardown(&mut self) -> Option<bool> {
        let bound = self.bound.take()?;
        if !self.registry.release_if(&self.request_id, &bound) {
            tracing::debug!(
                request_id = %self.request_id,
                "registry entry already released or displaced; leaving it in place"
            );
        }
        Some(bound.close_now())
    }
}

impl<C: TenantConnection> Drop for BindingGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(closed) = self.teardown() {
            if !closed {
                tracing::warn!(
                    request_id = %self.request_id,
                    "connection still leased during abnormal exit; closing it with its last handle"
                );
            }
            tracing::debug!(request_id = %self.request_id, "tenant binding released on abnormal exit");
        }
    }
}
