//! Token service - issuance, verification, rotation, revocation.
//!
//! Refresh tokens move through `Active -> Rotated | Revoked | Expired`, all
//! terminal. Rotation is compare-and-swap against the token store; the loser
//! of a concurrent rotation observes the token as already rotated and takes
//! the theft-detection path.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditLogEntry, Principal, RefreshTokenRecord};
use crate::services::{AccessTokenClaims, AuditRecorder, AuthError, ClientInfo, JwtService};
use crate::stores::{DirectoryStore, TokenStore};

/// Token pair handed to the client after login or refresh.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Refresh horizon in days; rotation preserves the horizon the session
    /// was opened with, so the cookie max-age must come from here.
    pub refresh_ttl_days: i64,
}

#[derive(Clone)]
pub struct TokenService {
    jwt: JwtService,
    store: Arc<dyn TokenStore>,
    directory: Arc<dyn DirectoryStore>,
    audit: AuditRecorder,
}

impl TokenService {
    pub fn new(
        jwt: JwtService,
        store: Arc<dyn TokenStore>,
        directory: Arc<dyn DirectoryStore>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            jwt,
            store,
            directory,
            audit,
        }
    }

    /// Issue a fresh token pair, opening a new refresh family.
    pub async fn issue(
        &self,
        principal: &Principal,
        remember: bool,
    ) -> Result<IssuedTokens, AuthError> {
        let token_id = Uuid::new_v4();
        let family_id = token_id;
        let ttl_days = self.jwt.refresh_token_ttl_days(remember);

        let refresh_token =
            self.jwt
                .generate_refresh_token(principal.id, token_id, family_id, ttl_days)?;
        let record =
            RefreshTokenRecord::new_family(token_id, principal.id, &refresh_token, ttl_days);
        self.store.insert(&record).await.map_err(AuthError::Store)?;

        let access_token = self
            .jwt
            .generate_access_token(principal.id, &principal.display_identifier)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in: self.jwt.access_token_expiry_seconds(),
            refresh_ttl_days: ttl_days,
        })
    }

    /// Verify an access token. Signature + expiry only, no store round-trip.
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.jwt.validate_access_token(token)
    }

    /// Rotate a presented refresh token into a new pair.
    pub async fn refresh(
        &self,
        presented: &str,
        client: &ClientInfo,
    ) -> Result<(Principal, IssuedTokens), AuthError> {
        let claims = self.jwt.validate_refresh_token(presented)?;
        let token_id: Uuid = claims.jti.parse().map_err(|_| AuthError::TokenMalformed)?;
        let family_id: Uuid = claims.fam.parse().map_err(|_| AuthError::TokenMalformed)?;
        let principal_id: Uuid = claims.sub.parse().map_err(|_| AuthError::TokenMalformed)?;

        let record = self
            .store
            .find(token_id)
            .await
            .map_err(AuthError::Store)?;

        let record = match record {
            // A signed token with no record, or one already rotated or
            // revoked, is evidence of replay after rotation.
            None => {
                return Err(self
                    .reuse_detected(principal_id, token_id, family_id, client)
                    .await)
            }
            Some(r) if r.rotated_to.is_some() || r.revoked => {
                return Err(self
                    .reuse_detected(principal_id, token_id, r.family_id, client)
                    .await)
            }
            Some(r) => r,
        };

        if record.token_hash != RefreshTokenRecord::hash_token(presented) {
            return Err(AuthError::TokenMalformed);
        }
        if record.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        let principal = self
            .directory
            .find_principal_by_id(record.principal_id)
            .await
            .map_err(AuthError::Store)?
            .filter(|p| p.is_active)
            .ok_or(AuthError::TokenRevoked)?;

        // Preserve the original horizon so "remember" sessions survive
        // rotation without storing the flag.
        let ttl_days = (record.expires_at - record.issued_at).num_days().max(1);

        let successor_id = Uuid::new_v4();
        let refresh_token = self.jwt.generate_refresh_token(
            principal.id,
            successor_id,
            record.family_id,
            ttl_days,
        )?;
        let successor = RefreshTokenRecord::in_family(
            successor_id,
            principal.id,
            record.family_id,
            &refresh_token,
            ttl_days,
        );

        let rotated = self
            .store
            .rotate(record.token_id, &successor)
            .await
            .map_err(AuthError::Store)?;
        if !rotated {
            // Lost the CAS race: a concurrent caller rotated first
            return Err(self
                .reuse_detected(principal.id, record.token_id, record.family_id, client)
                .await);
        }

        let access_token = self
            .jwt
            .generate_access_token(principal.id, &principal.display_identifier)?;

        Ok((
            principal,
            IssuedTokens {
                access_token,
                refresh_token,
                expires_in: self.jwt.access_token_expiry_seconds(),
                refresh_ttl_days: ttl_days,
            },
        ))
    }

    /// Revoke the record behind a presented refresh token (logout).
    ///
    /// Idempotent: unknown, already-revoked, and malformed tokens are a
    /// no-op success so error codes cannot leak token validity.
    pub async fn revoke(&self, presented: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let Ok(claims) = self.jwt.validate_refresh_token(presented) else {
            return Ok(());
        };
        let Ok(token_id) = claims.jti.parse::<Uuid>() else {
            return Ok(());
        };

        self.store.revoke(token_id).await.map_err(AuthError::Store)?;

        let actor = claims.sub.parse::<Uuid>().ok();
        self.audit
            .record(AuditLogEntry::new(
                actor,
                "logout",
                "principal",
                actor.map(|id| id.to_string()),
                None,
                None,
                client.ip.clone(),
                client.user_agent.clone(),
            ))
            .await;
        Ok(())
    }

    /// Family-wide revocation plus a security audit entry, then the error
    /// the caller surfaces.
    async fn reuse_detected(
        &self,
        principal_id: Uuid,
        token_id: Uuid,
        family_id: Uuid,
        client: &ClientInfo,
    ) -> AuthError {
        match self.store.revoke_family(family_id).await {
            Ok(revoked) => {
                tracing::warn!(
                    %family_id,
                    revoked,
                    "Refresh token reuse detected, family revoked"
                );
            }
            Err(e) => {
                tracing::error!(%family_id, error = %e, "Failed to revoke token family");
            }
        }

        self.audit
            .record(AuditLogEntry::new(
                Some(principal_id),
                "token_reuse_detected",
                "refresh_token",
                Some(token_id.to_string()),
                None,
                Some(json!({ "family_id": family_id })),
                client.ip.clone(),
                client.user_agent.clone(),
            ))
            .await;

        AuthError::TokenRevoked
    }
}
