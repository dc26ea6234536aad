//! Tenant decision: the first step of every unit of work.
//!
//! A decider inspects whatever the adapter hands it (request headers, GraphQL
//! operation metadata, ...) and returns exactly one [`TenantDecision`].
//! Deciders must be side-effect free.

use http::{HeaderMap, HeaderName, Request};

use crate::error::TenancyError;
use crate::tenant::Tenant;

/// Outcome of deciding which tenant applies to a unit of work.
#[derive(Debug)]
pub enum TenantDecision {
    /// Proceed with whatever tenant context already applies. Not an error.
    NoChange,
    /// Bind a connection switched to this tenant.
    ChangeTo(Tenant),
    /// The decision could not be made; fatal for the current attempt.
    Error(TenancyError),
}

impl TenantDecision {
    #[must_use]
    pub fn change_to(tenant: impl Into<Tenant>) -> Self {
        Self::ChangeTo(tenant.into())
    }

    /// Shorthand for `Error(TenancyError::NoTenantBound)`.
    #[must_use]
    pub fn no_tenant_bound() -> Self {
        Self::Error(TenancyError::NoTenantBound)
    }

    #[must_use]
    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChange)
    }

    /// Collapse into `Ok(None)` for no change, `Ok(Some(tenant))` for a
    /// change, or the decision error.
    ///
    /// # Errors
    /// Returns the carried error for [`TenantDecision::Error`].
    pub fn into_result(self) -> Result<Option<Tenant>, TenancyError> {
        match self {
            Self::NoChange => Ok(None),
            Self::ChangeTo(tenant) => Ok(Some(tenant)),
            Self::Error(err) => Err(err),
        }
    }
}

impl From<Tenant> for TenantDecision {
    fn from(tenant: Tenant) -> Self {
        Self::ChangeTo(tenant)
    }
}

/// Pluggable decision logic over an adapter-specific input `I`.
///
/// Closures `Fn(&I) -> TenantDecision` implement this trait, so adapters can
/// pass either a function or a configured object.
pub trait TenantDecider<I: ?Sized>: Send + Sync {
    fn decide(&self, input: &I) -> TenantDecision;
}

impl<I, F> TenantDecider<I> for F
where
    I: ?Sized,
    F: Fn(&I) -> TenantDecision + Send + Sync,
{
    fn decide(&self, input: &I) -> TenantDecision {
        self(input)
    }
}

/// Decider used when the integrator configured none: always fails with
/// [`TenancyError::NoTenantBound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FailsToDetermineTenant;

impl<I: ?Sized> TenantDecider<I> for FailsToDetermineTenant {
    fn decide(&self, _input: &I) -> TenantDecision {
        TenantDecision::no_tenant_bound()
    }
}

/// Decides the tenant from a request header.
///
/// - header missing or empty: `Error(NoTenantBound)`
/// - header equal to the configured no-change marker: `NoChange`
/// - otherwise: `ChangeTo(value)`
///
/// The value is taken verbatim: no trimming, and bytes that are not valid
/// UTF-8 are replaced with U+FFFD.
#[derive(Debug, Clone)]
pub struct TenantFromHeader {
    header: HeaderName,
    no_change_marker: Option<String>,
}

impl TenantFromHeader {
    #[must_use]
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            no_change_marker: None,
        }
    }

    /// Treat `marker` as "keep the current tenant" instead of a tenant name.
    #[must_use]
    pub fn no_change_on(mut self, marker: impl Into<String>) -> Self {
        self.no_change_marker = Some(marker.into());
        self
    }

    #[must_use]
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl TenantDecider<HeaderMap> for TenantFromHeader {
    fn decide(&self, headers: &HeaderMap) -> TenantDecision {
        let Some(value) = headers
            .get(&self.header)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .filter(|v| !v.is_empty())
        else {
            return TenantDecision::no_tenant_bound();
        };

        if self.no_change_marker.as_deref() == Some(value.as_ref()) {
            return TenantDecision::NoChange;
        }
        TenantDecision::change_to(value.into_owned())
    }
}

impl<B> TenantDecider<Request<B>> for TenantFromHeader {
    fn decide(&self, request: &Request<B>) -> TenantDecision {
        TenantDecider::<HeaderMap>::decide(self, request.headers())
    }
}
