//! Binder and retrieval entry point.

use std::sync::Arc;
use std::time::Duration;

use tracing::field::Empty;

use crate::config::{BindOptions, TenancyConfig};
use crate::connection::{BoundConnection, ConnectionProvider, TenantConnection};
use crate::context::ExecutionContext;
use crate::error::{ChangeTenantCause, Result, TenancyError};
use crate::registry::ConnectionRegistry;
use crate::request_id::{RequestIdGenerator, UuidV7Generator};
use crate::tenant::{RequestId, Tenant};

/// Shared entry point: owns the connection provider and the registry of live
/// bindings. Construct once, share behind an `Arc`.
///
/// ```ignore
/// let tenancy = Arc::new(Tenancy::new(pool));
///
/// let options = RunOptions::new().decide(&TenantFromHeader::new(header), req.headers());
/// tenancy
///     .run(ExecutionContext::new(), options, |ctx| async move {
///         let bound = tenancy.obtain_connection(&ctx)?;
///         let mut conn = bound.lock().await?;
///         // ... queries against the tenant's schema
///         Ok::<_, TenancyError>(())
///     })
///     .await?;
/// ```
pub struct Tenancy<P: ConnectionProvider> {
    provider: P,
    registry: ConnectionRegistry<P::Connection>,
    config: TenancyConfig,
    id_generator: Arc<dyn RequestIdGenerator>,
}

impl<P: ConnectionProvider> Tenancy<P> {
    /// Default configuration and the `UUIDv7` identity generator.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self::builder(provider).build()
    }

    #[must_use]
    pub fn builder(provider: P) -> TenancyBuilder<P> {
        TenancyBuilder {
            provider,
            config: TenancyConfig::default(),
            id_generator: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry<P::Connection> {
        &self.registry
    }

    pub(crate) fn id_generator(&self) -> &Arc<dyn RequestIdGenerator> {
        &self.id_generator
    }

    /// Acquire a raw connection, switch it to `tenant` and register it under
    /// the request identity carried by `ctx`.
    ///
    /// Exactly one switch statement is executed, bounded by the resolved
    /// timeout and by the context's cancellation token. No retries. On any
    /// failure after acquisition the raw connection is closed before
    /// returning, and nothing is registered.
    ///
    /// Most callers want [`Tenancy::run`], which also guarantees the binding
    /// is torn down.
    ///
    /// # Errors
    /// - [`TenancyError::NoConnectionBound`] if `ctx` carries no request identity
    /// - [`TenancyError::ObtainConnection`] if the provider fails
    /// - [`TenancyError::ChangeTenant`] if the switch fails, times out or is cancelled
    #[tracing::instrument(
        name = "tenancy.bind",
        skip_all,
        fields(tenant = %tenant, request_id = Empty),
        err
    )]
    pub async fn bind(
        &self,
        ctx: &ExecutionContext,
        tenant: &Tenant,
        options: &BindOptions,
    ) -> Result<BoundConnection<P::Connection>> {
        let timeout = options.resolve_timeout(&self.config);

        let request_id = ctx
            .request_id()
            .ok_or(TenancyError::NoConnectionBound)?
            .clone();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut raw = self
            .provider
            .acquire(ctx)
            .await
            .map_err(TenancyError::ObtainConnection)?;

        let statement = self.config.switch_statement.statement(tenant);
        if let Err(cause) = switch_tenant(&mut raw, &statement, timeout, ctx).await {
            raw.close();
            return Err(TenancyError::ChangeTenant {
                tenant: tenant.clone(),
                cause,
            });
        }

        let bound = BoundConnection::new(tenant.clone(), request_id.clone(), raw);
        self.registry.register(request_id, bound.clone());
        tracing::debug!("tenant connection bound");
        Ok(bound)
    }

    /// Connection bound for the request identity carried by `ctx`.
    ///
    /// This is how code nested inside a unit of work reaches the tenant's
    /// connection without it being threaded through call signatures.
    ///
    /// # Errors
    /// [`TenancyError::NoConnectionBound`] if `ctx` has no identity or the
    /// identity has no live binding (never bound, or already released).
    #[tracing::instrument(
        name = "tenancy.obtain_connection",
        skip_all,
        fields(request_id = Empty),
        err(level = "debug")
    )]
    pub fn obtain_connection(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<BoundConnection<P::Connection>> {
        let request_id = ctx.request_id().ok_or(TenancyError::NoConnectionBound)?;
        tracing::Span::current().record("request_id", request_id.as_str());
        self.registry
            .lookup(request_id)
            .ok_or(TenancyError::NoConnectionBound)
    }

    /// Drop the binding for `request_id` from the registry.
    ///
    /// Does NOT close the connection; that stays with whoever called
    /// [`Tenancy::bind`]. Idempotent.
    pub fn release_connection(
        &self,
        request_id: &RequestId,
    ) -> Option<BoundConnection<P::Connection>> {
        self.registry.release(request_id)
    }
}

async fn switch_tenant<C: TenantConnection>(
    conn: &mut C,
    statement: &str,
    timeout: Duration,
    ctx: &ExecutionContext,
) -> std::result::Result<(), ChangeTenantCause> {
    tokio::select! {
        biased;
        () = ctx.cancellation_token().cancelled() => Err(ChangeTenantCause::Cancelled),
        res = tokio::time::timeout(timeout, conn.execute(statement)) => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ChangeTenantCause::Driver(e)),
            Err(_) => Err(ChangeTenantCause::DeadlineExceeded(timeout)),
        },
    }
}

/// Builder for [`Tenancy`].
pub struct TenancyBuilder<P> {
    provider: P,
    config: TenancyConfig,
    id_generator: Option<Arc<dyn RequestIdGenerator>>,
}

impl<P: ConnectionProvider> TenancyBuilder<P> {
    #[must_use]
    pub fn config(mut self, config: TenancyConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn change_tenant_timeout(mut self, timeout: Duration) -> Self {
        self.config.change_tenant_timeout = timeout;
        self
    }

    /// Generator used by [`Tenancy::run`] unless a run overrides it.
    #[must_use]
    pub fn id_generator(mut self, generator: Arc<dyn RequestIdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn build(self) -> Tenancy<P> {
        Tenancy {
            provider: self.provider,
            registry: ConnectionRegistry::new(),
            config: self.config,
            id_generator: self
                .id_generator
                .unwrap_or_else(|| Arc::new(UuidV7Generator)),
        }
    }
}
