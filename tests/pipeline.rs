//! Mutation pipeline behavior: audit trail, events, batching, and the
//! compliance gate, exercised through the public facade.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tessera_core::backend::memory::MemoryBackend;
use tessera_core::config::{AuditMode, Config};
use tessera_core::core::crm_core::CrmCore;
use tessera_core::core::filter::Filter;
use tessera_core::core::models::{TenantId, UserId};
use tessera_core::core::session::InMemorySessionStore;
use tessera_core::core::store::MemoryKv;

fn test_config() -> Config {
    Config {
        kdf_iterations: 1_000,
        ..Config::default()
    }
}

fn core_with(backend: Arc<MemoryBackend>, config: Config) -> CrmCore {
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
        vec![
            json!({
                "user_id": "u1", "tenant_id": "acme", "role": "owner",
                "created_at": "2026-01-01T00:00:00Z",
            }),
            json!({
                "user_id": "u1", "tenant_id": "beta", "role": "member",
                "created_at": "2026-02-01T00:00:00Z",
            }),
        ],
    );
}

#[tokio::test]
async fn each_mutation_leaves_one_audit_row_and_one_event() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    let core = core_with(backend.clone(), test_config());
    let user = UserId::new("u1");
    let mut events = core.subscribe();

    let inserted = core
        .insert(&user, "contacts", json!({"name": "Ada"}))
        .await
        .data
        .unwrap();
    let id_filter = [Filter::eq("id", inserted["id"].as_str().unwrap())];
    core.update(&user, "contacts", &id_filter, json!({"name": "Ada L."}))
        .await;
    core.delete(&user, "contacts", &id_filter).await;

    let audit_rows = backend.rows("audit_log");
    assert_eq!(audit_rows.len(), 3);
    let actions: Vec<&str> = audit_rows
        .iter()
        .map(|r| r["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["created", "updated", "deleted"]);
    assert!(audit_rows.iter().all(|r| r["tenant_id"] == "acme"));
    assert!(audit_rows.iter().all(|r| r["actor_id"] == "u1"));

    for expected in ["created", "updated", "deleted"] {
        let event = events.try_recv().expect("event emitted");
        assert_eq!(event.action, expected);
        assert_eq!(event.entity, "contacts");
    }
}

#[tokio::test]
async fn audit_degradation_never_fails_the_mutation() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.break_collection("audit_log");
    let core = core_with(backend.clone(), test_config());
    let mut events = core.subscribe();

    let response = core
        .insert(&UserId::new("u1"), "contacts", json!({"name": "Ada"}))
        .await;
    assert!(response.success);
    assert_eq!(backend.rows("contacts").len(), 1);
    assert!(backend.rows("audit_log").is_empty());
    // The event still fires even when the audit write degraded.
    assert_eq!(events.try_recv().unwrap().action, "created");
}

#[tokio::test]
async fn batch_insert_splits_into_chunks() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    let core = core_with(backend.clone(), test_config());

    let records = (0..650).map(|i| json!({"n": i})).collect();
    let response = core
        .batch_insert(&UserId::new("u1"), "contacts", records)
        .await;
    assert!(response.success);
    assert_eq!(response.data, Some(650));
    let rows = backend.rows("contacts");
    assert_eq!(rows.len(), 650);
    assert!(rows.iter().all(|r| r["tenant_id"] == "acme"));
}

#[tokio::test]
async fn batch_abort_reports_the_inserted_count() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    // Two chunk inserts succeed, the third fails: 650 rows in chunks of 300
    // leaves exactly 600 committed.
    backend.fail_inserts_after("contacts", 2);
    let core = core_with(backend.clone(), test_config());

    let records = (0..650).map(|i| json!({"n": i})).collect();
    let response = core
        .batch_insert(&UserId::new("u1"), "contacts", records)
        .await;
    assert!(!response.success);
    assert_eq!(response.data, Some(600));
    let error = response.error.unwrap();
    assert_eq!(error.code, "batch_aborted");
    assert!(error.retryable);
    assert_eq!(backend.rows("contacts").len(), 600);

    // The abort is still audited, with the partial count.
    let audit_rows = backend.rows("audit_log");
    assert_eq!(audit_rows.len(), 1);
    assert_eq!(audit_rows[0]["payload"]["aborted"], true);
    assert_eq!(audit_rows[0]["payload"]["inserted"], 600);
}

#[tokio::test]
async fn strict_mode_blocks_noncompliant_collections() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.set_rls("contacts", false);
    let config = Config {
        rls_audit_mode: AuditMode::Strict,
        ..test_config()
    };
    let core = core_with(backend.clone(), config);

    let response = core
        .insert(&UserId::new("u1"), "contacts", json!({"name": "Ada"}))
        .await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "compliance_violation");
    assert!(backend.rows("contacts").is_empty());
    assert!(backend.rows("audit_log").is_empty());
}

#[tokio::test]
async fn warn_mode_proceeds_on_noncompliant_collections() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    backend.set_rls("contacts", false);
    let core = core_with(backend.clone(), test_config());

    let response = core
        .insert(&UserId::new("u1"), "contacts", json!({"name": "Ada"}))
        .await;
    assert!(response.success);
    assert_eq!(backend.rows("contacts").len(), 1);
}

#[tokio::test]
async fn create_tenant_failure_leaves_no_orphan() {
    let backend = Arc::new(MemoryBackend::new());
    backend.break_collection("tenant_members");
    let core = core_with(backend.clone(), test_config());

    let response = core
        .create_tenant(&UserId::new("u1"), json!({"name": "Acme"}))
        .await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "transient_backend_error");
    assert!(backend.rows("tenants").is_empty());
}

#[tokio::test]
async fn sign_out_resets_the_tenant_selection() {
    let backend = Arc::new(MemoryBackend::new());
    seed_memberships(&backend);
    let core = core_with(backend, test_config());
    let user = UserId::new("u1");

    core.switch_tenant(&user, &TenantId::new("beta")).await;
    assert_eq!(
        core.active_tenant(&user).await.data.unwrap().tenant_id.as_str(),
        "beta"
    );

    assert!(core.sign_out().success);
    // With the persisted context gone, the earliest membership is
    // auto-selected again.
    assert_eq!(
        core.active_tenant(&user).await.data.unwrap().tenant_id.as_str(),
        "acme"
    );
}

#[tokio::test]
async fn session_errors_surface_with_distinct_codes() {
    let backend = Arc::new(MemoryBackend::new());
    let core = core_with(backend, test_config());

    // Constructed with an empty session store.
    let response = core.validate_session().await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "no_session");
}
