use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Identifier must be 3-64 characters"))]
    #[schema(example = "jdoe")]
    pub identifier: String,

    #[validate(length(min = 8, message = "Secret must be at least 8 characters"))]
    #[schema(example = "correct-horse-battery", min_length = 8)]
    pub secret: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub principal_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Identifier is required"))]
    #[schema(example = "jdoe")]
    pub identifier: String,

    #[validate(length(min = 1, message = "Secret is required"))]
    #[schema(example = "correct-horse-battery")]
    pub secret: String,

    /// Lengthens the refresh horizon only; access tokens keep their TTL.
    #[serde(default)]
    #[schema(example = false)]
    pub remember: bool,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RefreshRequest {
    /// Body fallback for clients that cannot carry the cookie.
    #[schema(example = "refresh-token-123")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct LogoutRequest {
    #[schema(example = "refresh-token-123")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = true)]
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "jdoe")]
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfResponse {
    #[schema(example = "a3f1c2...")]
    pub csrf_token: String,
    /// Refresh cookie the client should expect on login and refresh
    #[schema(example = "orgkit_refresh")]
    pub cookie_name: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub access_token_expiry_seconds: i64,
}
