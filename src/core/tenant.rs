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

//! Tenant Context Manager.
//!
//! Resolves, persists (encrypted), and switches the active tenant. A switch
//! requires an existing membership; a rejected switch leaves the prior
//! context untouched. Persistence is last-write-wins: switches are rare and
//! user-driven, so no cross-process mutual exclusion is attempted.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::access::{DataAccess, Scope};
use crate::core::constants::{collections, columns, store};
use crate::core::errors::CoreError;
use crate::core::filter::{Filter, OrderBy, QueryOptions};
use crate::core::models::{TenantContext, TenantId, UserId};
use crate::core::observer::Observer;
use crate::core::store::EncryptedStore;

pub struct TenantContextManager {
    store: EncryptedStore,
    data: DataAccess,
    observer: Arc<Observer>,
}

impl TenantContextManager {
    pub fn new(store: EncryptedStore, data: DataAccess, observer: Arc<Observer>) -> Self {
        Self {
            store,
            data,
            observer,
        }
    }

    /// Reads the encrypted context; when absent, auto-selects the user's
    /// first membership and persists that choice.
    pub async fn active_tenant(&self, user_id: &UserId) -> Result<TenantContext, CoreError> {
        if let Some(ctx) = self.store.get::<TenantContext>(store::TENANT_CONTEXT_KEY)? {
            return Ok(ctx);
        }

        let filters = [Filter::eq(columns::USER_ID, user_id.as_str())];
        let options = QueryOptions::first(1).ordered(OrderBy::asc(columns::CREATED_AT));
        let memberships = self
            .data
            .select(collections::MEMBERSHIPS, &filters, &options, &Scope::Global)
            .await?;
        let first = memberships
            .first()
            .ok_or_else(|| CoreError::NoTenantMembership(user_id.to_string()))?;
        let tenant_id = record_tenant_id(first)?;

        let ctx = TenantContext::now(tenant_id);
        self.store.set(store::TENANT_CONTEXT_KEY, &ctx)?;
        info!(tenant_id = %ctx.tenant_id, "auto-selected first tenant membership");
        Ok(ctx)
    }

    /// Switches iff a membership exists for (user, tenant). On success the
    /// new context is persisted and a tenant-switched notification fires.
    pub async fn switch_tenant(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
    ) -> Result<TenantContext, CoreError> {
        let filters = [
            Filter::eq(columns::USER_ID, user_id.as_str()),
            Filter::eq(columns::TENANT_ID, tenant_id.as_str()),
        ];
        let memberships = self
            .data
            .select(
                collections::MEMBERSHIPS,
                &filters,
                &QueryOptions::first(1),
                &Scope::Global,
            )
            .await?;
        if memberships.is_empty() {
            warn!(user = %user_id, tenant = %tenant_id, "unauthorized tenant switch rejected");
            return Err(CoreError::TenantAuthorization {
                user_id: user_id.to_string(),
                tenant_id: tenant_id.to_string(),
            });
        }

        let ctx = TenantContext::now(tenant_id.clone());
        self.store.set(store::TENANT_CONTEXT_KEY, &ctx)?;

        self.observer
            .publish_mutation(
                "switched",
                "tenant",
                Some(tenant_id.to_string()),
                Some(user_id.clone()),
                Some(tenant_id.clone()),
                json!({ "switched_at": ctx.switched_at }),
            )
            .await;
        Ok(ctx)
    }

    /// Inserts the tenant, then the owning membership. A failed membership
    /// insert triggers a compensating tenant deletion so no tenant exists
    /// without an owner.
    pub async fn create_tenant(
        &self,
        user_id: &UserId,
        data: Value,
    ) -> Result<Value, CoreError> {
        let tenant = self
            .data
            .insert_one(collections::TENANTS, data, &Scope::Global)
            .await?;
        let tenant_id = record_tenant_key(&tenant)?;

        let membership = json!({
            (columns::USER_ID): user_id.as_str(),
            (columns::TENANT_ID): tenant_id.as_str(),
            (columns::ROLE): "owner",
        });
        if let Err(err) = self
            .data
            .insert_one(collections::MEMBERSHIPS, membership, &Scope::Global)
            .await
        {
            warn!(tenant = %tenant_id, "owner membership insert failed; compensating");
            if let Err(cleanup) = self
                .data
                .delete(
                    collections::TENANTS,
                    &[Filter::eq(columns::ID, tenant_id.as_str())],
                    &Scope::Global,
                )
                .await
            {
                warn!(tenant = %tenant_id, error = %cleanup, "compensating tenant delete failed");
            }
            return Err(err);
        }

        self.observer
            .publish_mutation(
                "created",
                "tenant",
                Some(tenant_id.to_string()),
                Some(user_id.clone()),
                Some(tenant_id),
                tenant.clone(),
            )
            .await;
        Ok(tenant)
    }

    /// Removes the persisted context (sign-out).
    pub fn clear(&self) -> Result<(), CoreError> {
        self.store.remove(store::TENANT_CONTEXT_KEY)?;
        Ok(())
    }
}

fn record_tenant_id(record: &Value) -> Result<TenantId, CoreError> {
    record
        .get(columns::TENANT_ID)
        .and_then(Value::as_str)
        .map(TenantId::new)
        .ok_or_else(|| CoreError::Configuration("membership row missing tenant_id".into()))
}

fn record_tenant_key(record: &Value) -> Result<TenantId, CoreError> {
    record
        .get(columns::ID)
        .and_then(Value::as_str)
        .map(TenantId::new)
        .ok_or_else(|| CoreError::Configuration("tenant row missing id".into()))
}
