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

//! Automation/Event Dispatcher.
//!
//! Fire-and-forget notifications for external consumers (reactive refresh,
//! automations). At-most-once: no subscriber, slow subscriber, or full
//! channel means the event is simply gone.

use tokio::sync::broadcast;
use tracing::debug;

use crate::core::constants::events::CHANNEL_CAPACITY;
use crate::core::models::DomainEvent;

pub struct EventDispatcher {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DomainEvent) {
        debug!(entity = %event.entity, action = %event.action, "event emitted");
        // A send error only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let dispatcher = EventDispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.emit(DomainEvent::new("contacts", "created", Some("c1".into()), json!({})));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, "contacts");
        assert_eq!(event.action, "created");
        assert_eq!(event.id.as_deref(), Some("c1"));
    }

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit(DomainEvent::new("contacts", "created", None, json!({})));
    }
}
