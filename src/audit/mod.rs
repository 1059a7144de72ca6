//! Audit-log collaborator.
//!
//! Fire-and-forget from the core's perspective: a failed `record` is
//! logged and swallowed by the lifecycle manager, never surfaced as an
//! operation failure.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{EntityId, OwnerId};
use crate::error::Result;

/// One audit event emitted around a lifecycle operation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub actor_id: OwnerId,
    pub action: &'static str,
    pub object_type: &'static str,
    pub object_id: EntityId,
    pub meta: serde_json::Value,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Emits audit entries as structured log events.
#[derive(Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        tracing::info!(
            audit_id = %Uuid::new_v4(),
            actor = entry.actor_id.0,
            action = entry.action,
            object_type = entry.object_type,
            object_id = entry.object_id.0,
            meta = %entry.meta,
            "audit"
        );
        Ok(())
    }
}
