use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dtos::ErrorResponse;
use crate::AppState;

/// Identity attached to a request after the bearer token checks out.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal_id: Uuid,
    pub identifier: String,
}

/// Require a valid access token.
///
/// Verification is purely computational (signature + expiry); revocation
/// takes effect at the refresh horizon, not here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing or invalid Authorization header".to_string(),
            }),
        ));
    };

    let claims = state.tokens.verify_access(token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or expired token".to_string(),
            }),
        )
    })?;

    let principal_id = claims.principal_id().map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or expired token".to_string(),
            }),
        )
    })?;

    req.extensions_mut().insert(RequestContext {
        principal_id,
        identifier: claims.idn,
    });

    Ok(next.run(req).await)
}

/// Extractor for the authenticated identity in handlers.
pub struct CurrentUser(pub RequestContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts.extensions.get::<RequestContext>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Request context missing; route not behind auth middleware".to_string(),
            }),
        ))?;

        Ok(CurrentUser(context.clone()))
    }
}
