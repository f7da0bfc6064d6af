//! Role and assignment handlers.
//!
//! A principal holds at most one active role; assigning a new role ends the
//! previous assignment rather than deleting it, so the history stays
//! auditable.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use orgkit_core::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::ErrorResponse,
    middleware::CurrentUser,
    models::{AuditLogEntry, PermissionKey, Role},
    services::ClientInfo,
    utils::ValidatedJson,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64, message = "Role name must be 1-64 characters"))]
    #[schema(example = "treasurer")]
    pub name: String,

    #[schema(example = "Handles finances")]
    pub description: Option<String>,

    /// Permission keys from the registry, e.g. "finances.view"
    #[schema(example = json!(["finances.view", "finances.edit"]))]
    pub permission_keys: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub name: String,
    pub permission_keys: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub principal_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub assignment_id: Uuid,
    pub principal_id: Uuid,
    pub role_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissionsResponse {
    pub permission_keys: Vec<String>,
}

/// Create a role with a set of registry permission keys
#[utoipa::path(
    post,
    path = "/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Unknown permission key", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .require(ctx.principal_id, PermissionKey::RolesManage)
        .await?;

    // Unknown keys are rejected up front; the registry is closed
    for key in &req.permission_keys {
        PermissionKey::from_key(key)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown permission key: {key}")))?;
    }

    let role = Role::new(req.name, req.description);
    state
        .directory
        .insert_role(&role, &req.permission_keys)
        .await
        .map_err(AppError::DatabaseError)?;

    state
        .audit
        .record(AuditLogEntry::new(
            Some(ctx.principal_id),
            "role_created",
            "role",
            Some(role.id.to_string()),
            Some(json!({ "name": role.name, "permission_keys": req.permission_keys })),
            None,
            client.ip,
            client.user_agent,
        ))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RoleResponse {
            role_id: role.id,
            name: role.name,
            permission_keys: req.permission_keys,
        }),
    ))
}

/// Assign a role, superseding any active assignment
#[utoipa::path(
    post,
    path = "/assignments",
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = AssignmentResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 404, description = "Principal not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    client: ClientInfo,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .require(ctx.principal_id, PermissionKey::RolesManage)
        .await?;

    state
        .directory
        .find_principal_by_id(req.principal_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Principal not found")))?;

    let assignment = state
        .directory
        .assign_role(req.principal_id, req.role_id)
        .await
        .map_err(AppError::DatabaseError)?;

    // The assignee's cached permission set is stale from this point
    state.policy.invalidate(req.principal_id);

    state
        .audit
        .record(AuditLogEntry::new(
            Some(ctx.principal_id),
            "role_assigned",
            "principal",
            Some(req.principal_id.to_string()),
            Some(json!({ "role_id": req.role_id })),
            None,
            client.ip,
            client.user_agent,
        ))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(AssignmentResponse {
            assignment_id: assignment.id,
            principal_id: assignment.principal_id,
            role_id: assignment.role_id,
            assigned_at: assignment.assigned_at,
        }),
    ))
}

/// The caller's effective permission set
#[utoipa::path(
    get,
    path = "/me/permissions",
    responses(
        (status = 200, description = "Effective permissions", body = EffectivePermissionsResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let effective = state.policy.resolve_effective(ctx.principal_id).await?;

    let mut permission_keys: Vec<String> =
        effective.iter().map(|p| p.as_key().to_string()).collect();
    permission_keys.sort();

    Ok(Json(EffectivePermissionsResponse { permission_keys }))
}
