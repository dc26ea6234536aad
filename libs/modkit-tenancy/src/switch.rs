use serde::{Deserialize, Serialize};

use crate::tenant::Tenant;

/// Placeholder replaced by the tenant name in [`TenantSwitch::Template`].
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Statement issued against a raw connection to make `tenant` its active
/// schema/database.
///
/// The tenant is interpolated verbatim. It is NOT quoted or escaped, so the
/// integrator must only let trusted tenant names through the decision step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSwitch {
    /// `USE <tenant>` (`MySQL` / `MariaDB`).
    #[default]
    Use,
    /// `SET search_path TO <tenant>` (`PostgreSQL` schemas).
    SearchPath,
    /// Arbitrary statement with a `{tenant}` placeholder.
    Template(String),
}

impl TenantSwitch {
    #[must_use]
    pub fn statement(&self, tenant: &Tenant) -> String {
        match self {
            Self::Use => format!("USE {tenant}"),
            Self::SearchPath => format!("SET search_path TO {tenant}"),
            Self::Template(template) => template.replace(TENANT_PLACEHOLDER, tenant.as_str()),
        }
    }
}
