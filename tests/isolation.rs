//! Tenant isolation properties exercised through the public facade.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tessera_core::backend::memory::MemoryBackend;
use tessera_core::config::Config;
use tessera_core::core::crm_core::CrmCore;
use tessera_core::core::filter::{Filter, OrderBy, QueryOptions};
use tessera_core::core::models::{TenantId, UserId};
use tessera_core::core::session::InMemorySessionStore;
use tessera_core::core::store::MemoryKv;

fn core_with(backend: Arc<MemoryBackend>) -> CrmCore {
    let config = Config {
        kdf_iterations: 1_000,
        ..Config::default()
    };
    CrmCore::new(
        config,
        backend,
        Arc::new(InMemorySessionStore::default()),
        Arc::new(MemoryKv::default()),
        HashMap::new(),
    )
    .unwrap()
}

fn seed_memberships(backend: &MemoryBackend) {
    backend.seed(
        "tenant_members",
        vec![json!({"user_id": "u1", "tenant_id": "acme", "role": "owner"})],
    );
}

#[tokio::test]
async fn select_never_returns_foreign_tenant_rows() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.seed(
        "contacts",
        vec![
            json!({"id": "c1", "tenant_id": "acme", "name": "Ada"}),
            json!({"id": "c2", "tenant_id": "beta", "name": "Mallory"}),
        ],
    );
    let core = core_with(backend);
    let user = UserId::new("u1");

    let response = core
        .select(&user, "contacts", &[], &QueryOptions::default())
        .await;
    assert!(response.success);
    let rows = response.data.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["tenant_id"], "acme");
}

#[tokio::test]
async fn caller_filters_cannot_widen_the_scope() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.seed(
        "contacts",
        vec![json!({"id": "c2", "tenant_id": "beta", "name": "Mallory"})],
    );
    let core = core_with(backend);
    let user = UserId::new("u1");

    // Even an explicit filter for the foreign tenant is ANDed with the
    // implicit scope and matches nothing.
    let rows = core
        .select(
            &user,
            "contacts",
            &[Filter::eq("tenant_id", "beta")],
            &QueryOptions::default(),
        )
        .await
        .data
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn update_and_delete_are_tenant_scoped() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.seed(
        "deals",
        vec![
            json!({"id": "d1", "tenant_id": "acme", "stage": "open"}),
            json!({"id": "d2", "tenant_id": "beta", "stage": "open"}),
        ],
    );
    let core = core_with(backend.clone());
    let user = UserId::new("u1");

    let updated = core
        .update(&user, "deals", &[], json!({"stage": "won"}))
        .await
        .data
        .unwrap();
    assert_eq!(updated.len(), 1);

    let removed = core.delete(&user, "deals", &[]).await.data.unwrap();
    assert_eq!(removed, 1);

    let survivors = backend.rows("deals");
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0]["tenant_id"], "beta");
    assert_eq!(survivors[0]["stage"], "open");
}

#[tokio::test]
async fn insert_stamps_the_active_tenant() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    let core = core_with(backend.clone());

    let response = core
        .insert(&UserId::new("u1"), "contacts", json!({"name": "Ada"}))
        .await;
    assert!(response.success);
    assert_eq!(response.data.unwrap()["tenant_id"], "acme");
}

#[tokio::test]
async fn pagination_is_an_inclusive_range() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.seed(
        "contacts",
        (0..40)
            .map(|i| json!({"tenant_id": "acme", "rank": i}))
            .collect(),
    );
    let core = core_with(backend);
    let user = UserId::new("u1");

    let options = QueryOptions {
        order_by: Some(OrderBy::asc("rank")),
        limit: Some(10),
        offset: Some(20),
    };
    let rows = core
        .select(&user, "contacts", &[], &options)
        .await
        .data
        .unwrap();
    let ranks: Vec<i64> = rows.iter().map(|r| r["rank"].as_i64().unwrap()).collect();
    assert_eq!(ranks, (20..=29).collect::<Vec<i64>>());
}

#[tokio::test]
async fn unauthorized_switch_keeps_acme_active() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    let core = core_with(backend);
    let user = UserId::new("u1");

    // Resolve (and persist) the initial context.
    let active = core.active_tenant(&user).await.data.unwrap();
    assert_eq!(active.tenant_id.as_str(), "acme");

    let response = core.switch_tenant(&user, &TenantId::new("beta")).await;
    assert!(!response.success);
    assert_eq!(
        response.error.unwrap().code,
        "tenant_authorization_error"
    );

    let still_active = core.active_tenant(&user).await.data.unwrap();
    assert_eq!(still_active.tenant_id.as_str(), "acme");
}
