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

//! RLS Compliance Auditor.
//!
//! Probes whether a collection enforces row-level isolation before a
//! mutation runs. An unavailable signal downgrades to `Unknown` and never
//! blocks; a confirmed-disabled signal is handled per the configured mode,
//! letting operators tighten the gate without breaking rollout.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::AuditMode;
use crate::core::errors::CoreError;
use crate::core::traits::DataBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlsStatus {
    Enforced,
    Disabled,
    Unknown,
}

pub struct RlsAuditor {
    backend: Arc<dyn DataBackend>,
    mode: AuditMode,
    // Definitive probe results only; Unknown is re-probed.
    cache: Mutex<HashMap<String, bool>>,
}

impl RlsAuditor {
    pub fn new(backend: Arc<dyn DataBackend>, mode: AuditMode) -> Self {
        Self {
            backend,
            mode,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Gate called before every mutation. Returns the probe outcome, or a
    /// `ComplianceViolation` when isolation is confirmed disabled under
    /// `strict`.
    pub async fn check(&self, collection: &str) -> Result<RlsStatus, CoreError> {
        if self.mode == AuditMode::Off {
            return Ok(RlsStatus::Unknown);
        }

        let enforced = match self.probe(collection).await {
            Some(enforced) => enforced,
            None => return Ok(RlsStatus::Unknown),
        };

        if enforced {
            return Ok(RlsStatus::Enforced);
        }
        match self.mode {
            AuditMode::Strict => Err(CoreError::ComplianceViolation {
                collection: collection.to_string(),
            }),
            _ => {
                warn!(
                    collection,
                    "row-level isolation disabled; proceeding (warn mode)"
                );
                Ok(RlsStatus::Disabled)
            }
        }
    }

    async fn probe(&self, collection: &str) -> Option<bool> {
        {
            let cache = self.cache.lock().await;
            if let Some(enforced) = cache.get(collection) {
                return Some(*enforced);
            }
        }
        match self.backend.rls_enabled(collection).await {
            Ok(Some(enforced)) => {
                self.cache
                    .lock()
                    .await
                    .insert(collection.to_string(), enforced);
                Some(enforced)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(collection, error = %err, "isolation probe unavailable");
                None
            }
        }
    }
}
