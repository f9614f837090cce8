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

//! Record Merge Engine.
//!
//! Two explicit stages: an authoritative remote merge procedure first; any
//! failure there (including "unavailable") falls through to a local merge
//! that re-points dependents, reconciles fields, and archives the duplicate.
//! Both stages produce the identical `MergeResult` shape and the same audit
//! record and event, so callers cannot tell which path executed. Duplicates
//! are archived with `merged_into`, never hard-deleted.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::access::{DataAccess, Scope};
use crate::core::constants::{columns, rpc};
use crate::core::errors::CoreError;
use crate::core::filter::{Filter, QueryOptions};
use crate::core::models::{MergeResult, MergeStrategy, RecordId, TenantId, UserId};
use crate::core::observer::Observer;
use crate::core::traits::DataBackend;

/// A collection holding foreign keys into a mergeable collection.
#[derive(Debug, Clone)]
pub struct DependentRef {
    pub collection: String,
    pub fk_column: String,
}

impl DependentRef {
    pub fn new(collection: &str, fk_column: &str) -> Self {
        Self {
            collection: collection.to_string(),
            fk_column: fk_column.to_string(),
        }
    }
}

pub struct MergeEngine {
    backend: Arc<dyn DataBackend>,
    data: DataAccess,
    observer: Arc<Observer>,
    /// collection → collections that reference it.
    dependents: HashMap<String, Vec<DependentRef>>,
}

impl MergeEngine {
    pub fn new(
        backend: Arc<dyn DataBackend>,
        data: DataAccess,
        observer: Arc<Observer>,
        dependents: HashMap<String, Vec<DependentRef>>,
    ) -> Self {
        Self {
            backend,
            data,
            observer,
            dependents,
        }
    }

    pub async fn merge_records(
        &self,
        collection: &str,
        primary_id: &RecordId,
        duplicate_id: &RecordId,
        strategy: MergeStrategy,
        scope: &Scope,
        actor: Option<&UserId>,
    ) -> Result<MergeResult, CoreError> {
        if primary_id == duplicate_id {
            return Err(CoreError::MergeRejected(
                "primary and duplicate ids are equal".into(),
            ));
        }

        let result = match self
            .remote_merge(collection, primary_id, duplicate_id, strategy)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                debug!(collection, error = %err, "remote merge unavailable; using local fallback");
                self.local_merge(collection, primary_id, duplicate_id, strategy, scope)
                    .await?
            }
        };

        let tenant = match scope {
            Scope::Tenant(id) => Some(id.clone()),
            Scope::Global => None,
        };
        self.observer
            .publish_mutation(
                "merged",
                collection,
                Some(primary_id.to_string()),
                actor.cloned(),
                tenant,
                json!({
                    "merged_from_id": duplicate_id.as_str(),
                    "strategy": strategy,
                }),
            )
            .await;
        Ok(result)
    }

    async fn remote_merge(
        &self,
        collection: &str,
        primary_id: &RecordId,
        duplicate_id: &RecordId,
        strategy: MergeStrategy,
    ) -> Result<MergeResult, CoreError> {
        let params = json!({
            "collection": collection,
            "primary_id": primary_id.as_str(),
            "duplicate_id": duplicate_id.as_str(),
            "strategy": strategy,
        });
        let merged = self.backend.rpc(rpc::MERGE_RECORDS, params).await?;
        Ok(MergeResult {
            primary_record: merged,
            merged_from_id: duplicate_id.clone(),
            strategy,
        })
    }

    async fn local_merge(
        &self,
        collection: &str,
        primary_id: &RecordId,
        duplicate_id: &RecordId,
        strategy: MergeStrategy,
        scope: &Scope,
    ) -> Result<MergeResult, CoreError> {
        // 1. Re-point dependents; individual failures are logged, not raised.
        for dep in self.dependents.get(collection).into_iter().flatten() {
            let filters = [Filter::eq(&dep.fk_column, duplicate_id.as_str())];
            let mut patch = Map::new();
            patch.insert(
                dep.fk_column.clone(),
                Value::String(primary_id.as_str().to_string()),
            );
            if let Err(err) = self
                .data
                .update(&dep.collection, &filters, Value::Object(patch), scope)
                .await
            {
                warn!(
                    dependent = %dep.collection,
                    error = %err,
                    "dependent re-point failed; continuing merge"
                );
            }
        }

        // 2. Compute merged fields.
        let primary = self.fetch_one(collection, primary_id, scope).await?;
        let duplicate = self.fetch_one(collection, duplicate_id, scope).await?;
        let patch = merge_fields(&primary, &duplicate, strategy);

        // 3. Persist the merged record under the primary id.
        let id_filter = [Filter::eq(columns::ID, primary_id.as_str())];
        let mut updated = self
            .data
            .update(collection, &id_filter, Value::Object(patch), scope)
            .await?;
        let primary_record = updated.pop().unwrap_or(primary);

        // 4. Archive the duplicate; never delete.
        let dup_filter = [Filter::eq(columns::ID, duplicate_id.as_str())];
        self.data
            .update(
                collection,
                &dup_filter,
                json!({
                    (columns::MERGED_INTO): primary_id.as_str(),
                    (columns::STATUS): "merged",
                }),
                scope,
            )
            .await?;

        Ok(MergeResult {
            primary_record,
            merged_from_id: duplicate_id.clone(),
            strategy,
        })
    }

    async fn fetch_one(
        &self,
        collection: &str,
        id: &RecordId,
        scope: &Scope,
    ) -> Result<Value, CoreError> {
        let filters = [Filter::eq(columns::ID, id.as_str())];
        let mut rows = self
            .data
            .select(collection, &filters, &QueryOptions::first(1), scope)
            .await?;
        rows.pop().ok_or_else(|| {
            CoreError::MergeRejected(format!("record '{id}' not found in '{collection}'"))
        })
    }
}

const PROTECTED_COLUMNS: [&str; 5] = [
    columns::ID,
    columns::TENANT_ID,
    columns::CREATED_AT,
    columns::MERGED_INTO,
    columns::STATUS,
];

/// Field reconciliation. PrimaryWins fills only null/missing primary fields
/// from the duplicate; NewestWins additionally lets a strictly newer
/// duplicate's non-null values overwrite the primary's.
fn merge_fields(primary: &Value, duplicate: &Value, strategy: MergeStrategy) -> Map<String, Value> {
    let empty = Map::new();
    let primary_obj = primary.as_object().unwrap_or(&empty);
    let duplicate_obj = duplicate.as_object().unwrap_or(&empty);

    let duplicate_newer = matches!(
        (updated_at(primary_obj), updated_at(duplicate_obj)),
        (Some(p), Some(d)) if d > p
    );

    let mut patch = Map::new();
    for (key, dup_value) in duplicate_obj {
        if dup_value.is_null() || PROTECTED_COLUMNS.contains(&key.as_str()) {
            continue;
        }
        let primary_value = primary_obj.get(key).unwrap_or(&Value::Null);
        let take = primary_value.is_null()
            || (strategy == MergeStrategy::NewestWins && duplicate_newer);
        if take && primary_value != dup_value {
            patch.insert(key.clone(), dup_value.clone());
        }
    }
    patch
}

fn updated_at(record: &Map<String, Value>) -> Option<DateTime<Utc>> {
    record
        .get(columns::UPDATED_AT)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
