use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::constants::collections;
use crate::core::models::AuditRecord;
use crate::core::traits::DataBackend;

/// Appends one structured record per mutating operation to the audit
/// collection. Best-effort: a failed write is logged and swallowed, never
/// unwinding the mutation it describes.
pub struct AuditWriter {
    backend: Arc<dyn DataBackend>,
}

impl AuditWriter {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    pub async fn write(&self, record: &AuditRecord) {
        let payload = serde_json::to_value(record).unwrap_or_else(|_| json!({}));

        info!(
            target: "audit",
            action = %record.action,
            resource_type = %record.resource_type,
            payload = %payload,
            "AUDIT"
        );

        if let Err(err) = self
            .backend
            .insert(collections::AUDIT_LOG, vec![payload])
            .await
        {
            warn!(target: "audit", error = %err, "audit write failed; continuing");
        }
    }
}
