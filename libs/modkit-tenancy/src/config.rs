//! Configuration for tenant binding.
//!
//! ```yaml
//! tenancy:
//!   change_tenant_timeout: 5s
//!   switch_statement: use          # or: search_path, or { template: "..." }
//! ```

use std::time::Duration;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::switch::TenantSwitch;

/// Crate-wide settings, normally loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenancyConfig {
    /// Upper bound for a single tenant-switch statement.
    #[serde(with = "humantime_serde")]
    pub change_tenant_timeout: Duration,

    /// Statement used to switch a raw connection to a tenant.
    pub switch_statement: TenantSwitch,
}

impl TenancyConfig {
    pub const DEFAULT_CHANGE_TENANT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Extract the section stored under `key`; a missing section yields defaults.
    ///
    /// # Errors
    /// Returns the figment error when the section exists but does not deserialize.
    pub fn from_figment(figment: &Figment, key: &str) -> Result<Self, figment::Error> {
        if figment.find_value(key).is_err() {
            return Ok(Self::default());
        }
        figment.extract_inner(key)
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            change_tenant_timeout: Self::DEFAULT_CHANGE_TENANT_TIMEOUT,
            switch_statement: TenantSwitch::default(),
        }
    }
}

/// Per-bind overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
    /// Replaces [`TenancyConfig::change_tenant_timeout`] for one bind.
    /// `None` or zero falls back to the configured value.
    pub change_tenant_timeout: Option<Duration>,
}

impl BindOptions {
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            change_tenant_timeout: Some(timeout),
        }
    }

    /// Timeout to apply given the configured default.
    #[must_use]
    pub fn resolve_timeout(&self, config: &TenancyConfig) -> Duration {
        match self.change_tenant_timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => config.change_tenant_timeout,
        }
    }
}
