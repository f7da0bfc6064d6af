use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use orgkit_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        audit::{AuditEntriesResponse, AuditSearchQuery, AuditSearchResponse},
        ErrorResponse,
    },
    middleware::CurrentUser,
    models::{AuditFilter, PermissionKey},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 50;

/// Search the audit log
#[utoipa::path(
    get,
    path = "/audit",
    params(AuditSearchQuery),
    responses(
        (status = 200, description = "Matching audit entries", body = AuditSearchResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Query(query): Query<AuditSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .require(ctx.principal_id, PermissionKey::AuditView)
        .await?;

    let filter = AuditFilter {
        actor_principal_id: query.actor_principal_id,
        action: query.action,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let (entries, total) = state.audit.search(&filter, page, limit).await?;

    Ok(Json(AuditSearchResponse {
        entries,
        total,
        page,
        limit,
    }))
}

/// Recent audit entries for one entity
#[utoipa::path(
    get,
    path = "/audit/entity/{entity_type}/{entity_id}",
    params(
        ("entity_type" = String, Path, description = "Entity type, e.g. principal"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    responses(
        (status = 200, description = "Entries touching the entity", body = AuditEntriesResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn entity_logs(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .require(ctx.principal_id, PermissionKey::AuditView)
        .await?;

    let entries = state
        .audit
        .entity_logs(&entity_type, &entity_id, DEFAULT_PAGE_SIZE)
        .await?;
    Ok(Json(AuditEntriesResponse { entries }))
}

/// Recent audit entries produced by one principal
#[utoipa::path(
    get,
    path = "/audit/user/{principal_id}",
    params(
        ("principal_id" = Uuid, Path, description = "Acting principal")
    ),
    responses(
        (status = 200, description = "Entries produced by the principal", body = AuditEntriesResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Permission denied", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn user_activity(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(principal_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .require(ctx.principal_id, PermissionKey::AuditView)
        .await?;

    let entries = state
        .audit
        .user_activity(principal_id, DEFAULT_PAGE_SIZE)
        .await?;
    Ok(Json(AuditEntriesResponse { entries }))
}
