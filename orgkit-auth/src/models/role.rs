//! Role and role-assignment models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Named bundle of permission keys.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
        }
    }
}

/// Binding of a principal to its single active role.
///
/// At most one assignment per principal has `ended_at = NULL`; superseded
/// assignments are ended, never deleted, so the history stays auditable.
#[derive(Debug, Clone, FromRow)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub role_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn new(principal_id: Uuid, role_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id,
            role_id,
            assigned_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
