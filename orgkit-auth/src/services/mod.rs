pub mod audit;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod policy;
pub mod rate_limit;
pub mod tokens;

pub use audit::AuditRecorder;
pub use credentials::CredentialVerifier;
pub use error::AuthError;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims};
pub use policy::PermissionResolver;
pub use rate_limit::{scope, RateLimiter, RatePolicy};
pub use tokens::{IssuedTokens, TokenService};

/// Request-origin metadata, recorded with security-relevant events.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}
