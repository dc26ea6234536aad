#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Binder and registry operations used without the execution wrapper.

mod common;

use modkit_tenancy::{BindOptions, ExecutionContext, RequestId, Tenancy, Tenant};

use common::FakeProvider;

fn tenancy() -> Tenancy<FakeProvider> {
    Tenancy::new(FakeProvider::new(&["tenant_1", "tenant_2"]))
}

fn ctx_with_id(id: &str) -> ExecutionContext {
    ExecutionContext::new().with_request_id(RequestId::from(id))
}

#[tokio::test]
async fn test_bind_without_request_id_fails_before_acquire() {
    let tenancy = tenancy();

    let err = tenancy
        .bind(
            &ExecutionContext::new(),
            &Tenant::from("tenant_1"),
            &BindOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.is_no_connection_bound());
    assert_eq!(tenancy.provider().stats.acquired(), 0);
    assert!(tenancy.registry().is_empty());
}

#[tokio::test]
async fn test_bind_is_visible_to_obtain_connection() {
    let tenancy = tenancy();
    let ctx = ctx_with_id("req-1");

    let bound = tenancy
        .bind(&ctx, &Tenant::from("tenant_2"), &BindOptions::default())
        .await
        .unwrap();

    let found = tenancy.obtain_connection(&ctx).unwrap();
    assert!(found.same_binding(&bound));
    assert_eq!(found.tenant().as_str(), "tenant_2");
    assert_eq!(found.request_id().as_str(), "req-1");
    assert_eq!(found.lock().await.unwrap().current_database(), Some("tenant_2"));

    assert!(
        tenancy
            .obtain_connection(&ctx_with_id("req-other"))
            .unwrap_err()
            .is_no_connection_bound()
    );
}

#[tokio::test]
async fn test_release_connection_is_idempotent_and_does_not_close() {
    let tenancy = tenancy();
    let ctx_a = ctx_with_id("req-a");
    let ctx_b = ctx_with_id("req-b");
    let a = tenancy
        .bind(&ctx_a, &Tenant::from("tenant_1"), &BindOptions::default())
        .await
        .unwrap();
    let b = tenancy
        .bind(&ctx_b, &Tenant::from("tenant_2"), &BindOptions::default())
        .await
        .unwrap();

    let id_a = RequestId::from("req-a");
    let released = tenancy.release_connection(&id_a).unwrap();
    assert!(released.same_binding(&a));
    assert!(tenancy.release_connection(&id_a).is_none());

    assert!(tenancy.obtain_connection(&ctx_a).unwrap_err().is_no_connection_bound());
    assert!(tenancy.obtain_connection(&ctx_b).unwrap().same_binding(&b));

    assert_eq!(tenancy.provider().stats.closed(), 0);
    assert!(!a.is_closed());
    assert_eq!(a.lock().await.unwrap().current_database(), Some("tenant_1"));

    // The caller of `bind` owns the connection; it closes with its last handle.
    drop(released);
    drop(a);
    assert_eq!(tenancy.provider().stats.closed(), 1);
}
