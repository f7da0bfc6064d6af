//! Injected store interfaces.
//!
//! Every shared, concurrently-mutated resource (credentials, refresh-token
//! records, rate-limit buckets, audit entries) sits behind a trait so the
//! same logic runs against the in-memory fakes in tests and against Postgres
//! in deployment. The critical updates (token rotation, bucket increment)
//! are atomic inside each implementation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{AuditFilter, AuditLogEntry, Principal, RefreshTokenRecord, Role, RoleAssignment};

pub use memory::{
    InMemoryAuditStore, InMemoryDirectoryStore, InMemoryRateLimitStore, InMemoryTokenStore,
};
pub use postgres::Database;

pub type StoreResult<T> = Result<T, anyhow::Error>;

/// Principals, roles, and role assignments.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_principal_by_identifier(&self, identifier: &str)
        -> StoreResult<Option<Principal>>;

    async fn find_principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>>;

    async fn insert_principal(&self, principal: &Principal) -> StoreResult<()>;

    /// Insert a role together with its permission rows.
    async fn insert_role(&self, role: &Role, permission_keys: &[String]) -> StoreResult<()>;

    /// The assignment with `ended_at = NULL`, if any.
    async fn active_assignment(&self, principal_id: Uuid) -> StoreResult<Option<RoleAssignment>>;

    /// Bind a principal to a role, ending any previous active assignment.
    async fn assign_role(&self, principal_id: Uuid, role_id: Uuid) -> StoreResult<RoleAssignment>;

    async fn role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<String>>;

    /// Every permission key referenced by any role; startup registry check.
    async fn all_role_permission_keys(&self) -> StoreResult<Vec<String>>;
}

/// Refresh-token records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    async fn find(&self, token_id: Uuid) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Compare-and-swap rotation.
    ///
    /// Marks `token_id` as rotated to `successor` and inserts the successor,
    /// in one atomic step, only if the record is still unrotated and
    /// unrevoked. Returns false when a concurrent caller won the race.
    async fn rotate(&self, token_id: Uuid, successor: &RefreshTokenRecord) -> StoreResult<bool>;

    /// Idempotent revocation; unknown ids are a no-op.
    async fn revoke(&self, token_id: Uuid) -> StoreResult<()>;

    /// Revoke every token in a family; returns how many records changed.
    async fn revoke_family(&self, family_id: Uuid) -> StoreResult<u64>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()>;

    /// Filtered page, newest-first, plus the total match count.
    async fn search(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<AuditLogEntry>, i64)>;
}

/// Fixed-window attempt counter state.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct RateLimitBucket {
    pub count: i64,
    pub window_start: DateTime<Utc>,
}

impl RateLimitBucket {
    pub fn window_expired(&self, window_seconds: i64, now: DateTime<Utc>) -> bool {
        now >= self.window_start + chrono::Duration::seconds(window_seconds)
    }
}

/// Rate-limit buckets keyed by (scope, identity).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically count one attempt, starting a fresh window if the current
    /// one has elapsed. Returns the post-increment bucket.
    async fn incr(
        &self,
        scope: &str,
        identity: &str,
        window_seconds: i64,
    ) -> StoreResult<RateLimitBucket>;

    async fn get(&self, scope: &str, identity: &str) -> StoreResult<Option<RateLimitBucket>>;

    async fn clear(&self, scope: &str, identity: &str) -> StoreResult<()>;
}
