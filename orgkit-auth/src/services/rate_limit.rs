//! Fixed-window request throttling.
//!
//! A window opens on the first counted attempt; once the count reaches the
//! policy maximum, further attempts are denied until the window elapses.
//! Fixed windows permit a burst at the boundary; that trade-off is accepted
//! for abuse prevention.

use chrono::Utc;
use std::sync::Arc;

use crate::services::AuthError;
use crate::stores::{RateLimitBucket, RateLimitStore};

/// Bucket scopes. Distinct scopes have independent buckets, so a flood on
/// one endpoint cannot lock out an unrelated one.
pub mod scope {
    pub const LOGIN: &str = "login";
    pub const HTTP: &str = "http";
}

#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub max_attempts: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Count one attempt and check it against the policy in a single atomic
    /// store operation. Used where every request is an attempt.
    pub async fn allow(
        &self,
        scope: &str,
        identity: &str,
        policy: RatePolicy,
    ) -> Result<(), AuthError> {
        let bucket = self
            .store
            .incr(scope, identity, policy.window_seconds)
            .await
            .map_err(AuthError::Store)?;

        if bucket.count > policy.max_attempts {
            return Err(self.denied(&bucket, policy));
        }
        Ok(())
    }

    /// Saturation test that does not count an attempt. The login path calls
    /// this before touching the credential store so saturated clients cost
    /// no hashing work.
    pub async fn check(
        &self,
        scope: &str,
        identity: &str,
        policy: RatePolicy,
    ) -> Result<(), AuthError> {
        let bucket = self
            .store
            .get(scope, identity)
            .await
            .map_err(AuthError::Store)?;

        if let Some(bucket) = bucket {
            if !bucket.window_expired(policy.window_seconds, Utc::now())
                && bucket.count >= policy.max_attempts
            {
                return Err(self.denied(&bucket, policy));
            }
        }
        Ok(())
    }

    /// Count one failed attempt.
    pub async fn record_failure(
        &self,
        scope: &str,
        identity: &str,
        policy: RatePolicy,
    ) -> Result<(), AuthError> {
        self.store
            .incr(scope, identity, policy.window_seconds)
            .await
            .map_err(AuthError::Store)?;
        Ok(())
    }

    /// Reset the bucket, e.g. after a successful login.
    pub async fn clear(&self, scope: &str, identity: &str) -> Result<(), AuthError> {
        self.store
            .clear(scope, identity)
            .await
            .map_err(AuthError::Store)
    }

    fn denied(&self, bucket: &RateLimitBucket, policy: RatePolicy) -> AuthError {
        let window_end = bucket.window_start + chrono::Duration::seconds(policy.window_seconds);
        let remaining = (window_end - Utc::now()).num_seconds().max(1) as u64;
        AuthError::RateLimited {
            retry_after_seconds: remaining,
        }
    }
}
