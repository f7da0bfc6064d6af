use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::AuditLogEntry;

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct AuditSearchQuery {
    /// Narrow to entries produced by this actor
    pub actor_principal_id: Option<Uuid>,
    /// Exact action name, e.g. "login"
    pub action: Option<String>,
    /// Exact entity type, e.g. "principal"
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Inclusive lower bound on created_at
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on created_at
    pub end_date: Option<DateTime<Utc>>,
    /// 1-based page number
    pub page: Option<i64>,
    /// Page size, capped server-side
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditSearchResponse {
    pub entries: Vec<AuditLogEntry>,
    #[schema(example = 42)]
    pub total: i64,
    #[schema(example = 1)]
    pub page: i64,
    #[schema(example = 50)]
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntriesResponse {
    pub entries: Vec<AuditLogEntry>,
}
