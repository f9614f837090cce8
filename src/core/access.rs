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

//! Generic Data Access.
//!
//! Translates the filter DSL into tenant-scoped operations against named
//! collections. The tenant scope is an explicit parameter: whenever a call
//! carries `Scope::Tenant`, an implicit `tenant_id` equality filter is
//! appended after the caller's filters. There is no way to opt out, which
//! makes cross-tenant leakage structurally impossible at this layer.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::core::constants::columns;
use crate::core::errors::CoreError;
use crate::core::filter::{Filter, QueryOptions};
use crate::core::models::TenantId;
use crate::core::traits::DataBackend;

/// Tenant scope carried explicitly through every call. `Global` exists for
/// the handful of pre-tenant collections (tenants, memberships, audit rows).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Tenant(TenantId),
    Global,
}

impl Scope {
    fn tenant(&self) -> Option<&TenantId> {
        match self {
            Scope::Tenant(id) => Some(id),
            Scope::Global => None,
        }
    }
}

#[derive(Clone)]
pub struct DataAccess {
    backend: Arc<dyn DataBackend>,
}

impl DataAccess {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    /// Caller filters plus the mandatory tenant filter.
    fn scoped(filters: &[Filter], scope: &Scope) -> Vec<Filter> {
        let mut scoped = filters.to_vec();
        if let Some(tenant) = scope.tenant() {
            scoped.push(Filter::eq(columns::TENANT_ID, tenant.as_str()));
        }
        scoped
    }

    fn stamp_tenant(record: &mut Value, scope: &Scope) {
        let Some(tenant) = scope.tenant() else { return };
        if let Some(obj) = record.as_object_mut() {
            let missing = matches!(obj.get(columns::TENANT_ID), None | Some(Value::Null));
            if missing {
                obj.insert(
                    columns::TENANT_ID.to_string(),
                    Value::String(tenant.as_str().to_string()),
                );
            }
        }
    }

    pub async fn select(
        &self,
        collection: &str,
        filters: &[Filter],
        options: &QueryOptions,
        scope: &Scope,
    ) -> Result<Vec<Value>, CoreError> {
        let rows = self
            .backend
            .select(collection, &Self::scoped(filters, scope), options)
            .await?;
        Ok(rows)
    }

    pub async fn insert_one(
        &self,
        collection: &str,
        mut record: Value,
        scope: &Scope,
    ) -> Result<Value, CoreError> {
        Self::stamp_tenant(&mut record, scope);
        let mut inserted = self.backend.insert(collection, vec![record]).await?;
        inserted
            .pop()
            .ok_or_else(|| CoreError::Configuration("backend returned no inserted row".into()))
    }

    pub async fn insert_many(
        &self,
        collection: &str,
        mut records: Vec<Value>,
        scope: &Scope,
    ) -> Result<Vec<Value>, CoreError> {
        for record in &mut records {
            Self::stamp_tenant(record, scope);
        }
        Ok(self.backend.insert(collection, records).await?)
    }

    pub async fn update(
        &self,
        collection: &str,
        filters: &[Filter],
        patch: Value,
        scope: &Scope,
    ) -> Result<Vec<Value>, CoreError> {
        let rows = self
            .backend
            .update(collection, &Self::scoped(filters, scope), patch)
            .await?;
        Ok(rows)
    }

    pub async fn delete(
        &self,
        collection: &str,
        filters: &[Filter],
        scope: &Scope,
    ) -> Result<u64, CoreError> {
        let removed = self
            .backend
            .delete(collection, &Self::scoped(filters, scope))
            .await?;
        Ok(removed)
    }

    /// Sequential fixed-size chunks, aborting on the first failing chunk.
    /// The error reports how many rows were inserted before the failure;
    /// there is no cross-chunk transaction.
    pub async fn batch_insert(
        &self,
        collection: &str,
        mut records: Vec<Value>,
        chunk_size: usize,
        scope: &Scope,
    ) -> Result<usize, CoreError> {
        if chunk_size == 0 {
            return Err(CoreError::Configuration(
                "batch chunk size must be non-zero".into(),
            ));
        }
        for record in &mut records {
            Self::stamp_tenant(record, scope);
        }

        let mut inserted = 0usize;
        let total = records.len();
        let mut remaining = records;
        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(chunk_size));
            let chunk = std::mem::replace(&mut remaining, rest);
            let chunk_len = chunk.len();
            match self.backend.insert(collection, chunk).await {
                Ok(_) => {
                    inserted += chunk_len;
                    debug!(collection, inserted, total, "batch chunk committed");
                }
                Err(source) => {
                    return Err(CoreError::BatchAborted { inserted, source });
                }
            }
        }
        Ok(inserted)
    }

    pub fn backend(&self) -> Arc<dyn DataBackend> {
        self.backend.clone()
    }
}
