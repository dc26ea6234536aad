#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `ModKit` per-request tenant binding for shared databases.
//!
//! One database server hosts one schema per tenant. For every unit of work
//! (an HTTP request, a GraphQL operation, a job) this crate:
//!
//! 1. asks a [`TenantDecider`] which tenant applies,
//! 2. generates a unique [`RequestId`] for the unit of work,
//! 3. acquires a raw connection, switches it to the tenant (`USE <tenant>` by
//!    default) under a timeout, and registers it under the request identity,
//! 4. runs the unit of work, from which any depth of code can call
//!    [`Tenancy::obtain_connection`] with the [`ExecutionContext`] it was given,
//! 5. releases the registration and closes the connection, also on error,
//!    panic or cancellation.
//!
//! # Features
//! - `mysql` (default), `pg`, `sqlite`: implement the connection capabilities
//!   for the matching `SQLx` pool
//! - `integration`: container-backed tests (requires Docker)
//!
//! # Tenant names
//! Tenant names are interpolated verbatim into the switch statement. They
//! must come from a trusted source or be validated by the decider.
//!
//! # Example
//! ```rust,ignore
//! use modkit_tenancy::{ExecutionContext, RunOptions, Tenancy, TenancyError, TenantDecision};
//!
//! let tenancy = Tenancy::new(pool);
//! let rows = tenancy
//!     .yield_with(
//!         ExecutionContext::new(),
//!         RunOptions::new().decision(TenantDecision::change_to("tenant_2")),
//!         |ctx| async {
//!             let bound = tenancy.obtain_connection(&ctx)?;
//!             let mut conn = bound.lock().await?;
//!             // ... queries against `tenant_2`
//!             Ok::<_, TenancyError>(42)
//!         },
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod decision;
pub mod error;
pub mod registry;
pub mod request_id;
pub mod runner;
pub mod switch;
pub mod tenancy;
pub mod tenant;

#[cfg(any(feature = "mysql", feature = "pg", feature = "sqlite"))]
mod drivers;

pub use config::{BindOptions, TenancyConfig};
pub use connection::{BoundConnection, ConnectionLease, ConnectionProvider, TenantConnection};
pub use context::ExecutionContext;
pub use decision::{FailsToDetermineTenant, TenantDecider, TenantDecision, TenantFromHeader};
pub use error::{BoxError, ChangeTenantCause, Result, TenancyError};
pub use registry::ConnectionRegistry;
pub use request_id::{MonotonicGenerator, RequestIdGenerator, UuidV7Generator};
pub use runner::RunOptions;
pub use switch::TenantSwitch;
pub use tenancy::{Tenancy, TenancyBuilder};
pub use tenant::{RequestId, Tenant};

// Re-exported so integrators name the same `CancellationToken` type.
pub use tokio_util::sync::CancellationToken;
