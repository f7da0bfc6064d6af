use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::AuthError;

/// JWT signing/verification over the configured secret key.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
    refresh_token_remember_days: i64,
}

/// Claims for access tokens (short-lived, stateless).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (principal ID)
    pub sub: String,
    /// Display identifier (login name)
    pub idn: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn principal_id(&self) -> Result<Uuid, AuthError> {
        self.sub.parse().map_err(|_| AuthError::TokenMalformed)
    }
}

/// Claims for refresh tokens; `jti` names the server-side record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (principal ID)
    pub sub: String,
    /// Token ID (matches the stored record)
    pub jti: String,
    /// Token family (lineage across rotations)
    pub fam: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 bytes");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
            refresh_token_remember_days: config.refresh_token_remember_days,
        })
    }

    /// Generate an access token for a principal.
    pub fn generate_access_token(
        &self,
        principal_id: Uuid,
        display_identifier: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: principal_id.to_string(),
            idn: display_identifier.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;
        Ok(token)
    }

    /// Generate a refresh token tied to a stored record.
    ///
    /// The TTL is explicit so the JWT `exp` and the record's `expires_at`
    /// always describe the same horizon, including across rotations.
    pub fn generate_refresh_token(
        &self,
        principal_id: Uuid,
        token_id: Uuid,
        family_id: Uuid,
        ttl_days: i64,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(ttl_days);

        let claims = RefreshTokenClaims {
            sub: principal_id.to_string(),
            jti: token_id.to_string(),
            fam: family_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))?;
        Ok(token)
    }

    /// Validate and decode an access token.
    ///
    /// Purely computational: signature plus expiry, no store lookup.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenMalformed,
            })
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<RefreshTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenMalformed,
            })
    }

    /// Access token expiry in seconds (for the client response).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    /// Refresh horizon in days; `remember` only lengthens this, never the
    /// access horizon.
    pub fn refresh_token_ttl_days(&self, remember: bool) -> i64 {
        if remember {
            self.refresh_token_remember_days
        } else {
            self.refresh_token_expiry_days
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-0123456789abcdef0123456789abcdef".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            refresh_token_remember_days: 30,
        }
    }

    #[test]
    fn test_rejects_short_secret() {
        let config = JwtConfig {
            secret: "too-short".to_string(),
            ..test_config()
        };
        assert!(JwtService::new(&config).is_err());
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::new(&test_config()).unwrap();
        let principal_id = Uuid::new_v4();

        let token = service.generate_access_token(principal_id, "jdoe").unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.principal_id().unwrap(), principal_id);
        assert_eq!(claims.idn, "jdoe");
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let service = JwtService::new(&test_config()).unwrap();
        let principal_id = Uuid::new_v4();
        let token_id = Uuid::new_v4();
        let family_id = Uuid::new_v4();

        let token = service
            .generate_refresh_token(principal_id, token_id, family_id, 7)
            .unwrap();
        let claims = service.validate_refresh_token(&token).unwrap();

        assert_eq!(claims.jti, token_id.to_string());
        assert_eq!(claims.fam, family_id.to_string());
    }

    #[test]
    fn test_garbage_is_malformed_not_expired() {
        let service = JwtService::new(&test_config()).unwrap();
        let err = service.validate_access_token("not-a-jwt").unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn test_wrong_key_is_malformed() {
        let service = JwtService::new(&test_config()).unwrap();
        let other = JwtService::new(&JwtConfig {
            secret: "other-secret-key-0123456789abcdef0123456789abcd".to_string(),
            ..test_config()
        })
        .unwrap();

        let token = other
            .generate_access_token(Uuid::new_v4(), "jdoe")
            .unwrap();
        let err = service.validate_access_token(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn test_remember_lengthens_refresh_horizon_only() {
        let service = JwtService::new(&test_config()).unwrap();
        assert_eq!(service.refresh_token_ttl_days(false), 7);
        assert_eq!(service.refresh_token_ttl_days(true), 30);
        assert_eq!(service.access_token_expiry_seconds(), 15 * 60);
    }
}
