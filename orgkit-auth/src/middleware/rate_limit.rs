use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::services::{scope, ClientInfo, RatePolicy};
use crate::AppState;

/// Best-effort client address: first hop of X-Forwarded-For when a proxy
/// supplied it, else the socket peer.
fn extract_client(headers: &HeaderMap, extensions: &Extensions) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let ip = forwarded.unwrap_or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    ClientInfo { ip, user_agent }
}

pub fn client_info(req: &Request) -> ClientInfo {
    extract_client(req.headers(), req.extensions())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(extract_client(&parts.headers, &parts.extensions))
    }
}

/// Per-IP throttle for the whole HTTP surface.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_info(&request);
    let policy = RatePolicy {
        max_attempts: state.config.rate_limit.global_ip_limit,
        window_seconds: state.config.rate_limit.global_ip_window_seconds,
    };

    match state.limiter.allow(scope::HTTP, &client.ip, policy).await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            let retry_after = match e {
                crate::services::AuthError::RateLimited {
                    retry_after_seconds,
                } => retry_after_seconds,
                other => {
                    // Store failure must not take the service down with it
                    tracing::error!(error = %other, "Rate limit store unavailable, letting request through");
                    return next.run(request).await;
                }
            };

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests. Please try again later."
                })),
            )
                .into_response();
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
