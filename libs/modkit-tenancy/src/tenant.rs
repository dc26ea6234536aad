//! Identifier newtypes shared by every layer of the crate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a logical partition (schema/database) of the shared database.
///
/// The value is opaque: no validation is performed and it is interpolated
/// verbatim into the tenant-switch statement. Restrict accepted values
/// upstream (e.g. an allow-list) before they reach this type.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tenant(Arc<str>);

impl Tenant {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tenant").field(&&*self.0).finish()
    }
}

impl From<&str> for Tenant {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tenant {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Tenant {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of one unit-of-work execution that holds a binding.
///
/// Generated fresh per binding attempt by a
/// [`RequestIdGenerator`](crate::RequestIdGenerator).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Arc<str>);

impl RequestId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestId").field(&&*self.0).finish()
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_is_opaque_and_verbatim() {
        let tenant = Tenant::from("tenant_1; DROP TABLE users");
        assert_eq!(tenant.as_str(), "tenant_1; DROP TABLE users");
        assert_eq!(tenant.to_string(), "tenant_1; DROP TABLE users");
    }

    #[test]
    fn test_tenant_comparable() {
        assert_eq!(Tenant::from("a"), Tenant::from(String::from("a")));
        assert!(Tenant::from("a") < Tenant::from("b"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Tenant::from("tenant_2")).unwrap();
        assert_eq!(json, r#""tenant_2""#);
        let id: RequestId = serde_json::from_str(r#""req-1""#).unwrap();
        assert_eq!(id.as_str(), "req-1");
    }
}
