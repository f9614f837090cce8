// Copyright 2026 Tessera Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CRM Core facade.
//!
//! The single entry point the presentation layer talks to. Explicitly
//! constructed with injected backends - no global client, no ambient tenant
//! state: the active tenant is resolved per call and carried as an explicit
//! scope. Every operation returns the uniform `{success, data, error}`
//! shape; backend failures come back as typed errors, never panics.
//!
//! Mutation pipeline: resolve tenant → RLS gate → execute → drain the
//! observability queue (one audit record + one event) → respond.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::core::access::{DataAccess, Scope};
use crate::core::crypto::Envelope;
use crate::core::errors::CoreError;
use crate::core::filter::{Filter, QueryOptions};
use crate::core::merge::{DependentRef, MergeEngine};
use crate::core::models::{
    ApiResponse, DomainEvent, MergeResult, MergeStrategy, RecordId, SessionClaims, TenantContext,
    TenantId, UserId,
};
use crate::core::observer::Observer;
use crate::core::rls::RlsAuditor;
use crate::core::session::{SessionValidator, ValidateOptions};
use crate::core::store::{EncryptedStore, KeyValueBackend};
use crate::core::tenant::TenantContextManager;
use crate::core::traits::{DataBackend, SessionStore};

pub struct CrmCore {
    data: DataAccess,
    tenants: TenantContextManager,
    rls: RlsAuditor,
    observer: Arc<Observer>,
    merge: MergeEngine,
    sessions: SessionValidator,
    batch_chunk_size: usize,
}

impl CrmCore {
    /// Wires the core. Key derivation runs here (CPU-bound), so construct
    /// once at startup rather than per request.
    pub fn new(
        config: Config,
        backend: Arc<dyn DataBackend>,
        session_store: Arc<dyn SessionStore>,
        kv: Arc<dyn KeyValueBackend>,
        dependents: HashMap<String, Vec<DependentRef>>,
    ) -> Result<Self, CoreError> {
        let envelope = Envelope::initialize(kv.as_ref(), &config)?;
        let store = EncryptedStore::new(kv, envelope);

        let data = DataAccess::new(backend.clone());
        let observer = Arc::new(Observer::new(backend.clone()));
        let tenants = TenantContextManager::new(store, data.clone(), observer.clone());
        let rls = RlsAuditor::new(backend.clone(), config.rls_audit_mode);
        let merge = MergeEngine::new(backend, data.clone(), observer.clone(), dependents);
        let sessions = SessionValidator::new(session_store, config.force_sign_out);

        Ok(Self {
            data,
            tenants,
            rls,
            observer,
            merge,
            sessions,
            batch_chunk_size: config.batch_chunk_size,
        })
    }

    /// Event stream for reactive refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.observer.subscribe()
    }

    async fn scope_for(&self, user: &UserId) -> Result<Scope, CoreError> {
        let ctx = self.tenants.active_tenant(user).await?;
        Ok(Scope::Tenant(ctx.tenant_id))
    }

    fn scope_tenant(scope: &Scope) -> Option<TenantId> {
        match scope {
            Scope::Tenant(id) => Some(id.clone()),
            Scope::Global => None,
        }
    }

    // ---- reads ----

    pub async fn select(
        &self,
        user: &UserId,
        collection: &str,
        filters: &[Filter],
        options: &QueryOptions,
    ) -> ApiResponse<Vec<Value>> {
        let result = async {
            let scope = self.scope_for(user).await?;
            self.data.select(collection, filters, options, &scope).await
        }
        .await;
        result.into()
    }

    // ---- mutations ----

    pub async fn insert(
        &self,
        user: &UserId,
        collection: &str,
        record: Value,
    ) -> ApiResponse<Value> {
        let result = async {
            let scope = self.scope_for(user).await?;
            self.rls.check(collection).await?;
            let inserted = self.data.insert_one(collection, record, &scope).await?;
            let id = record_id(&inserted);
            self.observer
                .publish_mutation(
                    "created",
                    collection,
                    id,
                    Some(user.clone()),
                    Self::scope_tenant(&scope),
                    inserted.clone(),
                )
                .await;
            Ok(inserted)
        }
        .await;
        result.into()
    }

    pub async fn update(
        &self,
        user: &UserId,
        collection: &str,
        filters: &[Filter],
        patch: Value,
    ) -> ApiResponse<Vec<Value>> {
        let result = async {
            let scope = self.scope_for(user).await?;
            self.rls.check(collection).await?;
            let updated = self.data.update(collection, filters, patch.clone(), &scope).await?;
            self.observer
                .publish_mutation(
                    "updated",
                    collection,
                    single_id(&updated),
                    Some(user.clone()),
                    Self::scope_tenant(&scope),
                    json!({ "matched": updated.len(), "patch": patch }),
                )
                .await;
            Ok(updated)
        }
        .await;
        result.into()
    }

    pub async fn delete(
        &self,
        user: &UserId,
        collection: &str,
        filters: &[Filter],
    ) -> ApiResponse<u64> {
        let result = async {
            let scope = self.scope_for(user).await?;
            self.rls.check(collection).await?;
            let removed = self.data.delete(collection, filters, &scope).await?;
            self.observer
                .publish_mutation(
                    "deleted",
                    collection,
                    None,
                    Some(user.clone()),
                    Self::scope_tenant(&scope),
                    json!({ "removed": removed }),
                )
                .await;
            Ok(removed)
        }
        .await;
        result.into()
    }

    /// Sequential chunked insert. On a mid-batch failure the response is a
    /// failure that still carries the count inserted before the abort.
    pub async fn batch_insert(
        &self,
        user: &UserId,
        collection: &str,
        records: Vec<Value>,
    ) -> ApiResponse<usize> {
        let total = records.len();
        let prepared = async {
            let scope = self.scope_for(user).await?;
            self.rls.check(collection).await?;
            Ok::<Scope, CoreError>(scope)
        }
        .await;
        let scope = match prepared {
            Ok(scope) => scope,
            Err(err) => return ApiResponse::err(&err),
        };

        match self
            .data
            .batch_insert(collection, records, self.batch_chunk_size, &scope)
            .await
        {
            Ok(inserted) => {
                self.observer
                    .publish_mutation(
                        "batch_created",
                        collection,
                        None,
                        Some(user.clone()),
                        Self::scope_tenant(&scope),
                        json!({ "inserted": inserted, "total": total }),
                    )
                    .await;
                ApiResponse::ok(inserted)
            }
            Err(err @ CoreError::BatchAborted { inserted, .. }) => {
                self.observer
                    .publish_mutation(
                        "batch_created",
                        collection,
                        None,
                        Some(user.clone()),
                        Self::scope_tenant(&scope),
                        json!({ "inserted": inserted, "total": total, "aborted": true }),
                    )
                    .await;
                ApiResponse::partial(inserted, &err)
            }
            Err(err) => ApiResponse::err(&err),
        }
    }

    // ---- tenants ----

    pub async fn active_tenant(&self, user: &UserId) -> ApiResponse<TenantContext> {
        self.tenants.active_tenant(user).await.into()
    }

    pub async fn switch_tenant(
        &self,
        user: &UserId,
        tenant_id: &TenantId,
    ) -> ApiResponse<TenantContext> {
        self.tenants.switch_tenant(user, tenant_id).await.into()
    }

    pub async fn create_tenant(&self, user: &UserId, data: Value) -> ApiResponse<Value> {
        self.tenants.create_tenant(user, data).await.into()
    }

    // ---- merge ----

    pub async fn merge_records(
        &self,
        user: &UserId,
        collection: &str,
        primary_id: &RecordId,
        duplicate_id: &RecordId,
        strategy: MergeStrategy,
    ) -> ApiResponse<MergeResult> {
        let result = async {
            let scope = self.scope_for(user).await?;
            self.rls.check(collection).await?;
            self.merge
                .merge_records(collection, primary_id, duplicate_id, strategy, &scope, Some(user))
                .await
        }
        .await;
        result.into()
    }

    // ---- sessions ----

    pub async fn validate_session(&self) -> ApiResponse<SessionClaims> {
        self.sessions.validate().await.into()
    }

    pub async fn validate_session_with(&self, opts: ValidateOptions) -> ApiResponse<SessionClaims> {
        self.sessions.validate_with(opts).await.into()
    }

    /// Clears the persisted tenant context. Token teardown belongs to the
    /// session store's owner (the auth SDK).
    pub fn sign_out(&self) -> ApiResponse<()> {
        self.tenants.clear().map(|_| ()).into()
    }
}

fn record_id(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

fn single_id(rows: &[Value]) -> Option<String> {
    match rows {
        [only] => record_id(only),
        _ => None,
    }
}
