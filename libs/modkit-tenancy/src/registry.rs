//! Registry of live bindings, keyed by request identity.
//!
//! Implementation details:
//! - One `RwLock` guards the whole map: lookups share it, register/release
//!   take it exclusively.
//! - The lock is only held for the map operation itself. Acquiring a
//!   connection and switching its tenant happen before `register` is called.
//! - Releasing does not close the connection; the execution wrapper does that.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::connection::{BoundConnection, TenantConnection};
use crate::tenant::RequestId;

/// Concurrency-safe map `RequestId -> BoundConnection`. Process-local, never persisted.
pub struct ConnectionRegistry<C: TenantConnection> {
    map: RwLock<HashMap<RequestId, BoundConnection<C>>>,
}

impl<C: TenantConnection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl<C: TenantConnection> ConnectionRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding under `request_id`.
    ///
    /// Last write wins: an existing live entry for the same identity is
    /// displaced and returned. Its connection stays open and remains the
    /// responsibility of whoever bound it. Identity generators are expected
    /// to never produce a live identity twice, so a displacement is logged.
    pub fn register(
        &self,
        request_id: RequestId,
        conn: BoundConnection<C>,
    ) -> Option<BoundConnection<C>> {
        let displaced = self.map.write().insert(request_id, conn);
        if let Some(prev) = &displaced {
            tracing::warn!(
                request_id = %prev.request_id(),
                tenant = %prev.tenant(),
                "request identity reused while still bound; previous binding displaced"
            );
        }
        displaced
    }

    /// Fetch the live binding for `request_id`, if any.
    #[must_use]
    pub fn lookup(&self, request_id: &RequestId) -> Option<BoundConnection<C>> {
        self.map.read().get(request_id).cloned()
    }

    /// Remove the binding for `request_id`. Idempotent: releasing an absent
    /// identity is a no-op and returns `None`.
    pub fn release(&self, request_id: &RequestId) -> Option<BoundConnection<C>> {
        self.map.write().remove(request_id)
    }

    /// Remove the entry for `request_id` only if it is still `bound`.
    ///
    /// Returns `false` when the identity is absent or now maps to another
    /// binding that displaced `bound`; that entry is left in place.
    pub fn release_if(&self, request_id: &RequestId, bound: &BoundConnection<C>) -> bool {
        let mut map = self.map.write();
        match map.get(request_id) {
            Some(current) if current.same_binding(bound) => {
                map.remove(request_id);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.map.read().contains_key(request_id)
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::tenant::Tenant;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Noop;

    #[async_trait]
    impl TenantConnection for Noop {
        async fn execute(&mut self, _statement: &str) -> Result<(), BoxError> {
            Ok(())
        }

        fn close(self) {}
    }

    fn binding(tenant: &str, id: &str) -> BoundConnection<Noop> {
        BoundConnection::new(Tenant::from(tenant), RequestId::from(id), Noop)
    }

    #[test]
    fn test_register_lookup_release() {
        let registry = ConnectionRegistry::new();
        let id = RequestId::from("req-1");
        let conn = binding("tenant_1", "req-1");

        assert!(registry.register(id.clone(), conn.clone()).is_none());
        let found = registry.lookup(&id).unwrap();
        assert!(found.same_binding(&conn));
        assert!(registry.contains(&id));

        let released = registry.release(&id).unwrap();
        assert!(released.same_binding(&conn));
        assert!(registry.lookup(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_unknown_is_absent() {
        let registry = ConnectionRegistry::<Noop>::new();
        assert!(registry.lookup(&RequestId::from("nope")).is_none());
    }

    #[test]
    fn test_release_is_idempotent_and_isolated() {
        let registry = ConnectionRegistry::new();
        let a = RequestId::from("req-a");
        let b = RequestId::from("req-b");
        registry.register(a.clone(), binding("tenant_1", "req-a"));
        registry.register(b.clone(), binding("tenant_2", "req-b"));

        assert!(registry.release(&a).is_some());
        assert!(registry.release(&a).is_none());
        assert!(registry.release(&a).is_none());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&b).unwrap().tenant().as_str(), "tenant_2");
    }

    #[test]
    #[traced_test]
    fn test_register_same_identity_displaces_and_warns() {
        let registry = ConnectionRegistry::new();
        let id = RequestId::from("req-dup");
        let first = binding("tenant_1", "req-dup");
        let second = binding("tenant_2", "req-dup");

        registry.register(id.clone(), first.clone());
        let displaced = registry.register(id.clone(), second.clone()).unwrap();

        assert!(displaced.same_binding(&first));
        assert!(registry.lookup(&id).unwrap().same_binding(&second));
        assert_eq!(registry.len(), 1);
        assert!(logs_contain("previous binding displaced"));
    }

    #[test]
    fn test_release_if_spares_displacing_binding() {
        let registry = ConnectionRegistry::new();
        let id = RequestId::from("corr-1");
        let first = binding("tenant_1", "corr-1");
        let second = binding("tenant_2", "corr-1");

        registry.register(id.clone(), first.clone());
        registry.register(id.clone(), second.clone());

        assert!(!registry.release_if(&id, &first));
        assert!(registry.lookup(&id).unwrap().same_binding(&second));

        assert!(registry.release_if(&id, &second));
        assert!(!registry.release_if(&id, &second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_lookup_release() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let id = RequestId::new(format!("req-{i}-{round}"));
                        let tenant = format!("tenant_{i}");
                        registry.register(id.clone(), binding(&tenant, id.as_str()));
                        let seen = registry.lookup(&id).unwrap();
                        assert_eq!(seen.tenant().as_str(), tenant);
                        assert_eq!(seen.request_id(), &id);
                        registry.release(&id);
                        assert!(registry.lookup(&id).is_none());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
