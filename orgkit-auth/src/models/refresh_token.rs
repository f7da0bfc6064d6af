//! Refresh-token record - the server-side half of a refresh token.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Revocable refresh-token record.
///
/// The client holds a signed JWT whose `jti` is `token_id`; only the SHA-256
/// hash of the presented string is stored. `family_id` ties together the
/// lineage produced by successive rotations; reuse of a rotated or revoked
/// member revokes the whole family.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub token_id: Uuid,
    pub principal_id: Uuid,
    pub family_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub rotated_to: Option<Uuid>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    /// Create the first record of a new family.
    pub fn new_family(token_id: Uuid, principal_id: Uuid, token: &str, ttl_days: i64) -> Self {
        // The family is named after its first token
        Self::in_family(token_id, principal_id, token_id, token, ttl_days)
    }

    /// Create a successor record in an existing family.
    pub fn in_family(
        token_id: Uuid,
        principal_id: Uuid,
        family_id: Uuid,
        token: &str,
        ttl_days: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id,
            principal_id,
            family_id,
            token_hash: Self::hash_token(token),
            issued_at: now,
            expires_at: now + Duration::days(ttl_days),
            rotated_to: None,
            revoked: false,
        }
    }

    /// Hash a presented token string using SHA-256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Active means: never rotated, never revoked, not expired.
    pub fn is_active(&self) -> bool {
        self.rotated_to.is_none() && !self.revoked && !self.is_expired()
    }
}
