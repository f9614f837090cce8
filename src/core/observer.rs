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

//! Outbound observability queue.
//!
//! Every mutating call produces exactly one audit record and one event,
//! drained here after the primary operation commits. Nothing in this module
//! can fail the caller: audit failures are swallowed by the writer and the
//! dispatcher is lossy by contract.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::audit::AuditWriter;
use crate::core::events::EventDispatcher;
use crate::core::models::{AuditRecord, DomainEvent, TenantId, UserId};
use crate::core::traits::DataBackend;

pub struct Observer {
    audit: AuditWriter,
    events: EventDispatcher,
}

impl Observer {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self {
            audit: AuditWriter::new(backend),
            events: EventDispatcher::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// Drains one audit record and one event. Infallible by design.
    pub async fn publish(&self, record: AuditRecord, event: DomainEvent) {
        self.audit.write(&record).await;
        self.events.emit(event);
    }

    /// Convenience for the common mutation shape: one record and one event
    /// built from the same facts.
    #[allow(clippy::too_many_arguments)]
    pub async fn publish_mutation(
        &self,
        action: &str,
        resource_type: &str,
        resource_id: Option<String>,
        actor_id: Option<UserId>,
        tenant_id: Option<TenantId>,
        payload: Value,
    ) {
        let record = AuditRecord::mutation(
            action,
            resource_type,
            resource_id.clone(),
            actor_id,
            tenant_id,
            payload.clone(),
        );
        let event = DomainEvent::new(resource_type, action, resource_id, payload);
        self.publish(record, event).await;
    }
}
