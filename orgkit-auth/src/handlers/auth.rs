use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use orgkit_core::error::AppError;
use rand::RngCore;

use crate::{
    dtos::{
        auth::{
            CsrfResponse, LoginRequest, LogoutRequest, MessageResponse, RefreshRequest,
            RegisterRequest, RegisterResponse, StatusResponse, TokenResponse,
        },
        ErrorResponse,
    },
    middleware::CurrentUser,
    models::PrincipalResponse,
    services::{ClientInfo, IssuedTokens},
    utils::{Secret, ValidatedJson},
    AppState,
};

fn refresh_cookie(state: &AppState, issued: &IssuedTokens) -> Cookie<'static> {
    Cookie::build((state.config.cookie.name.clone(), issued.refresh_token.clone()))
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(SameSite::Strict)
        .path("/auth")
        .max_age(time::Duration::days(issued.refresh_ttl_days))
        .build()
}

fn clear_refresh_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.cookie.name.clone(), String::new()))
        .http_only(true)
        .secure(state.config.cookie.secure)
        .same_site(SameSite::Strict)
        .path("/auth")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Create a principal
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Principal created", body = RegisterResponse),
        (status = 409, description = "Identifier already in use", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .credentials
        .register(&body.identifier, &Secret::new(body.secret), &client)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            principal_id: principal.id.to_string(),
        }),
    ))
}

/// Login with identifier and secret
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, issued) = state
        .credentials
        .login(&body.identifier, &Secret::new(body.secret), body.remember, &client)
        .await?;

    let jar = jar.add(refresh_cookie(&state, &issued));

    Ok((
        StatusCode::OK,
        jar,
        Json(TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
        }),
    ))
}

/// Rotate the refresh token and mint a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    // Cookie wins over the body so a stale body copy cannot shadow the
    // rotated cookie token
    let cookie_token = jar
        .get(&state.config.cookie.name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let body_token = body.and_then(|Json(b)| b.refresh_token);
    let presented = cookie_token
        .or(body_token)
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing refresh token")))?;

    let (principal, issued) = state.tokens.refresh(&presented, &client).await?;

    // The rotated cookie keeps the horizon the session was opened with
    let jar = jar.add(refresh_cookie(&state, &issued));

    tracing::debug!(principal_id = %principal.id, "Refresh token rotated");

    Ok((
        StatusCode::OK,
        jar,
        Json(TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
        }),
    ))
}

/// Revoke the refresh token and clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let cookie_token = jar
        .get(&state.config.cookie.name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let body_token = body.and_then(|Json(b)| b.refresh_token);

    // Best effort; logout must succeed whatever the token's state
    if let Some(presented) = cookie_token.or(body_token) {
        if let Err(e) = state.tokens.revoke(&presented, &client).await {
            tracing::error!(error = %e, "Logout revocation failed");
        }
    }

    let jar = jar.add(clear_refresh_cookie(&state));

    Ok((
        StatusCode::OK,
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Report whether the presented access token is currently valid.
///
/// Always 200; "not authenticated" is an answer, not an error.
#[utoipa::path(
    get,
    path = "/auth/status",
    responses(
        (status = 200, description = "Session status", body = StatusResponse)
    ),
    tag = "Authentication"
)]
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let claims = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.verify_access(token).ok());

    let response = match claims {
        Some(claims) => StatusResponse {
            authenticated: true,
            principal_id: Some(claims.sub),
            identifier: Some(claims.idn),
        },
        None => StatusResponse {
            authenticated: false,
            principal_id: None,
            identifier: None,
        },
    };

    Json(response)
}

/// The caller's own principal record
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current principal", body = PrincipalResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .directory
        .find_principal_by_id(ctx.principal_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Principal not found")))?;

    Ok(Json(PrincipalResponse::from(principal)))
}

/// Mint a CSRF token for double-submit protection, with the client-facing
/// session configuration
#[utoipa::path(
    get,
    path = "/auth/csrf",
    responses(
        (status = 200, description = "CSRF token and session configuration", body = CsrfResponse)
    ),
    tag = "Authentication"
)]
pub async fn csrf(State(state): State<AppState>) -> impl IntoResponse {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Json(CsrfResponse {
        csrf_token: hex::encode(bytes),
        cookie_name: state.config.cookie.name.clone(),
        access_token_expiry_seconds: state.config.jwt.access_token_expiry_minutes * 60,
    })
}
