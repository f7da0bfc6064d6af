use orgkit_core::error::AppError;
use thiserror::Error;

/// Failure taxonomy of the auth subsystem.
///
/// Callers match on the precise kind; the HTTP boundary collapses kinds into
/// deliberately generic responses (see `From<AuthError> for AppError`).
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Token malformed")]
    TokenMalformed,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Identifier already in use")]
    IdentifierTaken,

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            // Credential and token failures all look alike to the caller;
            // only this log line retains the kind.
            AuthError::InvalidCredentials => {
                tracing::debug!(kind = "invalid_credentials", "Authentication failed");
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            AuthError::TokenExpired => {
                tracing::debug!(kind = "token_expired", "Authentication failed");
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            AuthError::TokenRevoked => {
                tracing::debug!(kind = "token_revoked", "Authentication failed");
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            AuthError::TokenMalformed => {
                tracing::debug!(kind = "token_malformed", "Authentication failed");
                AppError::AuthError(anyhow::anyhow!("Invalid or expired token"))
            }
            // The missing permission key is never echoed back
            AuthError::PermissionDenied => {
                AppError::Forbidden(anyhow::anyhow!("Permission denied"))
            }
            AuthError::IdentifierTaken => {
                AppError::Conflict(anyhow::anyhow!("Identifier already in use"))
            }
            AuthError::RateLimited {
                retry_after_seconds,
            } => AppError::TooManyRequests(
                "Too many attempts. Please try again later.".to_string(),
                Some(retry_after_seconds),
            ),
            AuthError::Store(e) => AppError::DatabaseError(e),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}
