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

//! Backend seams.
//!
//! The core is constructed with explicit, injected implementations of these
//! traits; there is no global client. Callers impose their own timeouts
//! around every call - this layer defines no cancellation contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::BackendError;
use crate::core::filter::{Filter, QueryOptions};

/// The remote, network-bound record store. Collections hold flat JSON
/// records; filters are ANDed.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(
        &self,
        collection: &str,
        filters: &[Filter],
        options: &QueryOptions,
    ) -> Result<Vec<Value>, BackendError>;

    /// Inserts the given records, returning them as stored (ids assigned).
    async fn insert(&self, collection: &str, records: Vec<Value>)
        -> Result<Vec<Value>, BackendError>;

    /// Applies `patch` to every matching record, returning the updated rows.
    async fn update(
        &self,
        collection: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Deletes matching records, returning the number removed.
    async fn delete(&self, collection: &str, filters: &[Filter]) -> Result<u64, BackendError>;

    /// Invokes a named server-side procedure.
    async fn rpc(&self, function: &str, params: Value) -> Result<Value, BackendError>;

    /// Probes whether the backend enforces row-level isolation for the
    /// collection. `None` means the signal is unavailable.
    async fn rls_enabled(&self, collection: &str) -> Result<Option<bool>, BackendError>;
}

/// Holder of the current bearer token, typically the auth SDK.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn current_token(&self) -> Option<String>;
    async fn sign_out(&self);
}
