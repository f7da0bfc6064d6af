pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod stores;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use orgkit_core::error::AppError;
use orgkit_core::middleware::security_headers::security_headers_middleware;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::SecurityScheme,
    Modify, OpenApi,
};

use crate::config::AuthConfig;
use crate::services::{
    AuditRecorder, CredentialVerifier, JwtService, PermissionResolver, RateLimiter, RatePolicy,
    TokenService,
};
use crate::stores::{AuditStore, Database, DirectoryStore, RateLimitStore, TokenStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::status,
        handlers::auth::csrf,
        handlers::auth::get_me,
        handlers::roles::create_role,
        handlers::roles::assign_role,
        handlers::roles::my_permissions,
        handlers::audit::search,
        handlers::audit::entity_logs,
        handlers::audit::user_activity,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::TokenResponse,
            dtos::auth::MessageResponse,
            dtos::auth::StatusResponse,
            dtos::auth::CsrfResponse,
            dtos::audit::AuditSearchResponse,
            dtos::audit::AuditEntriesResponse,
            handlers::roles::CreateRoleRequest,
            handlers::roles::RoleResponse,
            handlers::roles::AssignRoleRequest,
            handlers::roles::AssignmentResponse,
            handlers::roles::EffectivePermissionsResponse,
            models::AuditLogEntry,
            models::PrincipalResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Credential verification and token lifecycle"),
        (name = "Roles", description = "Role and permission management"),
        (name = "Audit", description = "Security audit log"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub directory: Arc<dyn DirectoryStore>,
    pub tokens: TokenService,
    pub credentials: CredentialVerifier,
    pub policy: PermissionResolver,
    pub limiter: RateLimiter,
    pub audit: AuditRecorder,
    /// Present when backed by Postgres; absent under in-memory stores.
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn DirectoryStore>,
        token_store: Arc<dyn TokenStore>,
        audit_store: Arc<dyn AuditStore>,
        rate_store: Arc<dyn RateLimitStore>,
        db: Option<Database>,
    ) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt)
            .map_err(AppError::ConfigError)?;
        let audit = AuditRecorder::new(audit_store);
        let limiter = RateLimiter::new(rate_store);
        let tokens = TokenService::new(jwt, token_store, directory.clone(), audit.clone());
        let login_policy = RatePolicy {
            max_attempts: config.rate_limit.login_attempts,
            window_seconds: config.rate_limit.login_window_seconds,
        };
        let credentials = CredentialVerifier::new(
            directory.clone(),
            tokens.clone(),
            limiter.clone(),
            audit.clone(),
            login_policy,
        );
        let policy = PermissionResolver::new(directory.clone());

        Ok(Self {
            config: Arc::new(config),
            directory,
            tokens,
            credentials,
            policy,
            limiter,
            audit,
            db,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/roles", post(handlers::roles::create_role))
        .route("/assignments", post(handlers::roles::assign_role))
        .route("/me/permissions", get(handlers::roles::my_permissions))
        .route("/audit", get(handlers::audit::search))
        .route(
            "/audit/entity/:entity_type/:entity_id",
            get(handlers::audit::entity_logs),
        )
        .route("/audit/user/:principal_id", get(handlers::audit::user_activity))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %o, error = %e, "Invalid CORS origin, skipping");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/status", get(handlers::auth::status))
        .route("/auth/csrf", get(handlers::auth::csrf))
        .merge(protected)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
        .with_state(state)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(db) = &state.db {
        db.health_check().await.map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            AppError::DatabaseError(e)
        })?;
    }

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
