//! Audit log models - append-only security/business event records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One immutable audit entry.
///
/// `actor_principal_id` is `None` for system-originated events. The
/// application never mutates or deletes entries; retention is operational.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_principal_id: Option<Uuid>,
    #[schema(example = "login")]
    pub action: String,
    #[schema(example = "principal")]
    pub entity_type: String,
    pub entity_id: Option<String>,
    /// Structured before/after diff, when the action mutated an entity.
    #[schema(value_type = Option<Object>)]
    pub changes: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    #[schema(example = "203.0.113.7")]
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor_principal_id: Option<Uuid>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        changes: Option<Value>,
        metadata: Option<Value>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_principal_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            changes,
            metadata,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            created_at: Utc::now(),
        }
    }
}

/// Filter for audit queries; all fields combine conjunctively.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_principal_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// True when `entry` satisfies every set field.
    ///
    /// The in-memory store filters with this; the Postgres store compiles
    /// the same predicate into WHERE clauses.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(actor) = self.actor_principal_id {
            if entry.actor_principal_id != Some(actor) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(entity_type) = &self.entity_type {
            if &entry.entity_type != entity_type {
                return false;
            }
        }
        if let Some(entity_id) = &self.entity_id {
            if entry.entity_id.as_deref() != Some(entity_id.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if entry.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if entry.created_at > end {
                return false;
            }
        }
        true
    }
}
