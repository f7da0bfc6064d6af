//! Principal model - authenticated actors (members, staff).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// An actor that can authenticate.
///
/// Principals are deactivated, never hard-deleted, while tokens or audit
/// entries still reference them.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub display_identifier: String,
    pub secret_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(display_identifier: impl Into<String>, secret_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_identifier: display_identifier.into(),
            secret_hash: secret_hash.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Principal view for API responses (no secret material).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub display_identifier: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Principal> for PrincipalResponse {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            display_identifier: p.display_identifier,
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}
