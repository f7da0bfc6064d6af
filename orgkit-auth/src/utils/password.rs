use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

/// Newtype for the plaintext secret to prevent accidental logging
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Newtype for a stored Argon2 hash
#[derive(Debug, Clone)]
pub struct SecretHash(String);

impl SecretHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash built once at startup and verified against whenever a login names an
/// unknown identifier, so both branches of a failed login cost one Argon2
/// verification.
static DECOY_HASH: Lazy<SecretHash> = Lazy::new(|| {
    let secret = Secret::new(uuid::Uuid::new_v4().to_string());
    hash_secret(&secret).unwrap_or_else(|_| {
        SecretHash::new(
            "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$\
             K5c0Dr1L1L0S0m0PlAcEhOlDeRvAlUeNoTaReAlHsH"
                .to_string(),
        )
    })
});

/// Hash a secret using Argon2id with default parameters.
///
/// Salt is generated per call and carried inside the PHC string.
pub fn hash_secret(secret: &Secret) -> Result<SecretHash, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(secret.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {}", e))?
        .to_string();

    Ok(SecretHash::new(hash))
}

/// Verify a secret against a stored hash.
///
/// Returns Ok(()) on match, Err otherwise.
pub fn verify_secret(secret: &Secret, hash: &SecretHash) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid secret hash format: {}", e))?;

    Argon2::default()
        .verify_password(secret.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Secret verification failed"))
}

/// Burn one verification against the decoy hash. Always fails; called on the
/// unknown-identifier path so its timing matches a real mismatch.
pub fn verify_decoy(secret: &Secret) {
    let _ = verify_secret(secret, &DECOY_HASH);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret() {
        let secret = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&secret).expect("Failed to hash secret");

        assert!(!hash.as_str().is_empty());
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_secret_correct() {
        let secret = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&secret).expect("Failed to hash secret");

        assert!(verify_secret(&secret, &hash).is_ok());
    }

    #[test]
    fn test_verify_secret_incorrect() {
        let secret = Secret::new("mySecurePassword123".to_string());
        let hash = hash_secret(&secret).expect("Failed to hash secret");

        let wrong = Secret::new("wrongPassword".to_string());
        assert!(verify_secret(&wrong, &hash).is_err());
    }

    #[test]
    fn test_different_hashes_for_same_secret() {
        let secret = Secret::new("mySecurePassword123".to_string());
        let hash1 = hash_secret(&secret).expect("Failed to hash secret");
        let hash2 = hash_secret(&secret).expect("Failed to hash secret");

        // Random salt means distinct hashes that both verify
        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_secret(&secret, &hash1).is_ok());
        assert!(verify_secret(&secret, &hash2).is_ok());
    }

    #[test]
    fn test_decoy_never_matches() {
        verify_decoy(&Secret::new("anything".to_string()));
        assert!(verify_secret(&Secret::new("anything".to_string()), &DECOY_HASH).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{:?}", secret), "Secret(***)");
    }
}
