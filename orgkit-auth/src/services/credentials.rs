//! Credential verification and the login flow.
//!
//! The failure paths are shaped to resist account enumeration: an unknown
//! identifier, a wrong secret, and a deactivated principal all produce the
//! same error, and the unknown-identifier branch still burns one Argon2
//! verification against a decoy hash.

use std::sync::Arc;

use crate::models::{AuditLogEntry, Principal};
use crate::services::{
    scope, AuditRecorder, AuthError, ClientInfo, IssuedTokens, RateLimiter, RatePolicy,
    TokenService,
};
use crate::stores::DirectoryStore;
use crate::utils::{hash_secret, verify_decoy, verify_secret, Secret, SecretHash};

#[derive(Clone)]
pub struct CredentialVerifier {
    directory: Arc<dyn DirectoryStore>,
    tokens: TokenService,
    limiter: RateLimiter,
    audit: AuditRecorder,
    login_policy: RatePolicy,
}

impl CredentialVerifier {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        tokens: TokenService,
        limiter: RateLimiter,
        audit: AuditRecorder,
        login_policy: RatePolicy,
    ) -> Self {
        Self {
            directory,
            tokens,
            limiter,
            audit,
            login_policy,
        }
    }

    /// Create a principal with a hashed secret.
    pub async fn register(
        &self,
        identifier: &str,
        secret: &Secret,
        client: &ClientInfo,
    ) -> Result<Principal, AuthError> {
        let existing = self
            .directory
            .find_principal_by_identifier(identifier)
            .await
            .map_err(AuthError::Store)?;
        if existing.is_some() {
            return Err(AuthError::IdentifierTaken);
        }

        let hash = hash_secret(secret)?;
        let principal = Principal::new(identifier, hash.into_string());
        self.directory
            .insert_principal(&principal)
            .await
            .map_err(AuthError::Store)?;

        self.audit
            .record(AuditLogEntry::new(
                Some(principal.id),
                "principal_created",
                "principal",
                Some(principal.id.to_string()),
                None,
                None,
                client.ip.clone(),
                client.user_agent.clone(),
            ))
            .await;

        Ok(principal)
    }

    /// Authenticate and issue a token pair.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &Secret,
        remember: bool,
        client: &ClientInfo,
    ) -> Result<(Principal, IssuedTokens), AuthError> {
        // Saturated clients are turned away before any hashing work
        self.limiter
            .check(scope::LOGIN, &client.ip, self.login_policy)
            .await?;

        let principal = self
            .directory
            .find_principal_by_identifier(identifier)
            .await
            .map_err(AuthError::Store)?;

        let Some(principal) = principal else {
            verify_decoy(secret);
            return Err(self.failed_attempt(client).await);
        };

        let stored = SecretHash::new(principal.secret_hash.clone());
        if verify_secret(secret, &stored).is_err() || !principal.is_active {
            return Err(self.failed_attempt(client).await);
        }

        // Bucket store trouble must not abort a verified login
        if let Err(e) = self.limiter.clear(scope::LOGIN, &client.ip).await {
            tracing::error!(error = %e, "Failed to clear login attempt bucket");
        }

        let issued = self.tokens.issue(&principal, remember).await?;

        self.audit
            .record(AuditLogEntry::new(
                Some(principal.id),
                "login",
                "principal",
                Some(principal.id.to_string()),
                None,
                None,
                client.ip.clone(),
                client.user_agent.clone(),
            ))
            .await;

        Ok((principal, issued))
    }

    async fn failed_attempt(&self, client: &ClientInfo) -> AuthError {
        if let Err(e) = self
            .limiter
            .record_failure(scope::LOGIN, &client.ip, self.login_policy)
            .await
        {
            tracing::error!(error = %e, "Failed to count login attempt");
        }
        AuthError::InvalidCredentials
    }
}
