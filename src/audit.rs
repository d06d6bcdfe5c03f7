//! # Audit sink
//!
//! Fire-and-forget delivery of audit events. Emitting never blocks the caller
//! and a failed delivery never fails the operation that produced the event.

use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use serde_json::Value as JsonValue;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::repositories::AuditLogRepository;
use crate::telemetry::AUDIT_FAILURES_TOTAL;

/// One audit trail entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub actor_id: Option<Uuid>,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub details: JsonValue,
}

impl AuditEvent {
    pub fn batch(actor_id: Uuid, batch_id: Uuid, action: &'static str, details: JsonValue) -> Self {
        Self {
            actor_id: Some(actor_id),
            entity_type: "batch",
            entity_id: batch_id,
            action,
            details,
        }
    }

    pub fn record(actor_id: Uuid, record_id: Uuid, action: &'static str, details: JsonValue) -> Self {
        Self {
            actor_id: Some(actor_id),
            entity_type: "record",
            entity_id: record_id,
            action,
            details,
        }
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    /// Hand the event off; must not block or fail
    fn emit(&self, event: AuditEvent);
}

/// Writes events to the `audit_logs` table on a background task
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    db: Arc<DatabaseConnection>,
    pending: TaskTracker,
}

impl DbAuditSink {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            pending: TaskTracker::new(),
        }
    }

    /// Wait for every write emitted so far to finish
    pub async fn flush(&self) {
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }
}

impl AuditSink for DbAuditSink {
    fn emit(&self, event: AuditEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(action = event.action, "No runtime available; audit event dropped");
            counter!(AUDIT_FAILURES_TOTAL).increment(1);
            return;
        };

        let db = self.db.clone();
        self.pending.spawn_on(async move {
            let action = event.action;
            let entity_id = event.entity_id;
            if let Err(error) = AuditLogRepository::new(db.as_ref()).insert(event).await {
                counter!(AUDIT_FAILURES_TOTAL).increment(1);
                tracing::warn!(%error, action, %entity_id, "Failed to write audit event");
            }
        }, &handle);
    }
}
