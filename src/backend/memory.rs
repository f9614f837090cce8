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

//! In-memory `DataBackend`.
//!
//! Reference implementation used by tests and local development: evaluates
//! the filter DSL, applies single-column ordering and inclusive pagination,
//! serves registered rpc responses, and supports per-collection fault
//! injection so failure paths (batch aborts, audit degradation, remote-merge
//! fallback) are reproducible in-process.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::core::constants::columns;
use crate::core::errors::BackendError;
use crate::core::filter::{Filter, QueryOptions};
use crate::core::traits::DataBackend;

#[derive(Default)]
struct Faults {
    /// Collections whose every operation fails.
    broken: Vec<String>,
    /// Per-collection count of insert calls that will still succeed before
    /// the backend starts failing them.
    insert_budget: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryBackend {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    rls: Mutex<HashMap<String, bool>>,
    rpc_responses: Mutex<HashMap<String, Value>>,
    faults: Mutex<Faults>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection with rows, assigning ids where missing.
    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        let mut collections = self.collections.lock().expect("backend lock poisoned");
        let stored = collections.entry(collection.to_string()).or_default();
        for mut row in rows {
            ensure_id(&mut row);
            stored.push(row);
        }
    }

    /// Snapshot of a collection's rows.
    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .expect("backend lock poisoned")
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Declares whether row-level isolation is enforced for a collection.
    /// Undeclared collections report an unavailable signal.
    pub fn set_rls(&self, collection: &str, enforced: bool) {
        self.rls
            .lock()
            .expect("backend lock poisoned")
            .insert(collection.to_string(), enforced);
    }

    /// Registers a canned rpc response. Unregistered functions are
    /// unavailable.
    pub fn register_rpc(&self, function: &str, response: Value) {
        self.rpc_responses
            .lock()
            .expect("backend lock poisoned")
            .insert(function.to_string(), response);
    }

    /// Makes every operation on the collection fail.
    pub fn break_collection(&self, collection: &str) {
        self.faults
            .lock()
            .expect("backend lock poisoned")
            .broken
            .push(collection.to_string());
    }

    /// Lets the next `calls` insert calls on the collection succeed, then
    /// fails subsequent ones.
    pub fn fail_inserts_after(&self, collection: &str, calls: usize) {
        self.faults
            .lock()
            .expect("backend lock poisoned")
            .insert_budget
            .insert(collection.to_string(), calls);
    }

    fn check_broken(&self, collection: &str) -> Result<(), BackendError> {
        let faults = self.faults.lock().expect("backend lock poisoned");
        if faults.broken.iter().any(|c| c == collection) {
            return Err(BackendError::Unavailable(format!(
                "collection '{collection}' unreachable"
            )));
        }
        Ok(())
    }

    fn consume_insert_budget(&self, collection: &str) -> Result<(), BackendError> {
        let mut faults = self.faults.lock().expect("backend lock poisoned");
        if let Some(remaining) = faults.insert_budget.get_mut(collection) {
            if *remaining == 0 {
                return Err(BackendError::Query(format!(
                    "insert into '{collection}' rejected"
                )));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

fn ensure_id(record: &mut Value) {
    if let Some(obj) = record.as_object_mut() {
        let missing = !matches!(obj.get(columns::ID), Some(Value::String(_)));
        if missing {
            obj.insert(
                columns::ID.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
    }
}

fn compare_rows(a: &Value, b: &Value, column: &str) -> Ordering {
    let left = a.get(column).unwrap_or(&Value::Null);
    let right = b.get(column).unwrap_or(&Value::Null);
    if let (Some(x), Some(y)) = (left.as_f64(), right.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Some(x), Some(y)) = (left.as_str(), right.as_str()) {
        return x.cmp(y);
    }
    // Nulls and incomparable values sort first.
    match (left.is_null(), right.is_null()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn paginate(rows: Vec<Value>, options: &QueryOptions) -> Vec<Value> {
    let offset = options.offset.unwrap_or(0);
    match options.limit {
        // limit + offset: inclusive range [offset, offset+limit-1]
        Some(limit) => rows.into_iter().skip(offset).take(limit).collect(),
        None if offset > 0 => rows.into_iter().skip(offset).collect(),
        None => rows,
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn select(
        &self,
        collection: &str,
        filters: &[Filter],
        options: &QueryOptions,
    ) -> Result<Vec<Value>, BackendError> {
        self.check_broken(collection)?;
        let collections = self.collections.lock().expect("backend lock poisoned");
        let mut rows: Vec<Value> = collections
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        if let Some(order) = &options.order_by {
            rows.sort_by(|a, b| {
                let ord = compare_rows(a, b, &order.column);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        Ok(paginate(rows, options))
    }

    async fn insert(
        &self,
        collection: &str,
        records: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        self.check_broken(collection)?;
        self.consume_insert_budget(collection)?;

        let mut collections = self.collections.lock().expect("backend lock poisoned");
        let stored = collections.entry(collection.to_string()).or_default();
        let mut inserted = Vec::with_capacity(records.len());
        for mut record in records {
            ensure_id(&mut record);
            stored.push(record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        collection: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        self.check_broken(collection)?;
        let Some(patch) = patch.as_object().cloned() else {
            return Err(BackendError::Query("update patch must be an object".into()));
        };

        let mut collections = self.collections.lock().expect("backend lock poisoned");
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if filters.iter().all(|f| f.matches(row)) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in &patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> Result<u64, BackendError> {
        self.check_broken(collection)?;
        let mut collections = self.collections.lock().expect("backend lock poisoned");
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        Ok((before - rows.len()) as u64)
    }

    async fn rpc(&self, function: &str, _params: Value) -> Result<Value, BackendError> {
        let responses = self.rpc_responses.lock().expect("backend lock poisoned");
        responses.get(function).cloned().ok_or_else(|| {
            BackendError::Unavailable(format!("rpc function '{function}' not available"))
        })
    }

    async fn rls_enabled(&self, collection: &str) -> Result<Option<bool>, BackendError> {
        self.check_broken(collection)?;
        Ok(self
            .rls
            .lock()
            .expect("backend lock poisoned")
            .get(collection)
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::OrderBy;
    use serde_json::json;

    #[tokio::test]
    async fn ordering_and_inclusive_pagination() {
        let backend = MemoryBackend::new();
        backend.seed(
            "contacts",
            (0..30).map(|i| json!({"rank": i})).collect(),
        );

        let options = QueryOptions {
            order_by: Some(OrderBy::desc("rank")),
            limit: Some(5),
            offset: Some(10),
        };
        let rows = backend.select("contacts", &[], &options).await.unwrap();
        let ranks: Vec<i64> = rows.iter().map(|r| r["rank"].as_i64().unwrap()).collect();
        assert_eq!(ranks, vec![19, 18, 17, 16, 15]);
    }

    #[tokio::test]
    async fn update_and_delete_respect_filters() {
        let backend = MemoryBackend::new();
        backend.seed(
            "deals",
            vec![
                json!({"id": "d1", "stage": "open"}),
                json!({"id": "d2", "stage": "won"}),
            ],
        );

        let updated = backend
            .update("deals", &[Filter::eq("stage", "open")], json!({"stage": "lost"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["id"], "d1");

        let removed = backend
            .delete("deals", &[Filter::eq("stage", "won")])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.rows("deals").len(), 1);
    }

    #[tokio::test]
    async fn insert_budget_fault_injection() {
        let backend = MemoryBackend::new();
        backend.fail_inserts_after("deals", 1);

        assert!(backend.insert("deals", vec![json!({"n": 1})]).await.is_ok());
        assert!(matches!(
            backend.insert("deals", vec![json!({"n": 2})]).await,
            Err(BackendError::Query(_))
        ));
    }

    #[tokio::test]
    async fn unregistered_rpc_is_unavailable() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.rpc("merge_records", json!({})).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
