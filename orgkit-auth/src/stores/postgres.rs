//! PostgreSQL store implementations.
//!
//! One `Database` wrapper over a `PgPool` implements every store trait with
//! runtime-bound queries. Rotation and bucket increments rely on conditional
//! updates / upserts so concurrency control lives in the database.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    AuditFilter, AuditLogEntry, Principal, RefreshTokenRecord, Role, RoleAssignment,
};

use super::{
    AuditStore, DirectoryStore, RateLimitBucket, RateLimitStore, StoreResult, TokenStore,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for Database {
    async fn find_principal_by_identifier(
        &self,
        identifier: &str,
    ) -> StoreResult<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT * FROM principals WHERE LOWER(display_identifier) = LOWER($1)",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(principal)
    }

    async fn find_principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(principal)
    }

    async fn insert_principal(&self, principal: &Principal) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO principals (id, display_identifier, secret_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(principal.id)
        .bind(&principal.display_identifier)
        .bind(&principal.secret_hash)
        .bind(principal.is_active)
        .bind(principal.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_role(&self, role: &Role, permission_keys: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO roles (id, name, description) VALUES ($1, $2, $3)")
            .bind(role.id)
            .bind(&role.name)
            .bind(&role.description)
            .execute(&mut *tx)
            .await?;
        for key in permission_keys {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_key) VALUES ($1, $2)")
                .bind(role.id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn active_assignment(&self, principal_id: Uuid) -> StoreResult<Option<RoleAssignment>> {
        let assignment = sqlx::query_as::<_, RoleAssignment>(
            "SELECT * FROM role_assignments WHERE principal_id = $1 AND ended_at IS NULL",
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn assign_role(&self, principal_id: Uuid, role_id: Uuid) -> StoreResult<RoleAssignment> {
        let assignment = RoleAssignment::new(principal_id, role_id);
        let mut tx = self.pool.begin().await?;
        // Supersede, never stack: prior assignments are ended, not deleted
        sqlx::query(
            "UPDATE role_assignments SET ended_at = NOW() WHERE principal_id = $1 AND ended_at IS NULL",
        )
        .bind(principal_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO role_assignments (id, principal_id, role_id, assigned_at, ended_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.principal_id)
        .bind(assignment.role_id)
        .bind(assignment.assigned_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(assignment)
    }

    async fn role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT permission_key FROM role_permissions WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn all_role_permission_keys(&self) -> StoreResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT permission_key FROM role_permissions",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn insert(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (token_id, principal_id, family_id, token_hash, issued_at, expires_at, rotated_to, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.token_id)
        .bind(record.principal_id)
        .bind(record.family_id)
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.rotated_to)
        .bind(record.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, token_id: Uuid) -> StoreResult<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_tokens WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn rotate(&self, token_id: Uuid, successor: &RefreshTokenRecord) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // The guard makes concurrent rotations of the same token race on
        // affected-row count; exactly one caller sees 1.
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET rotated_to = $2
            WHERE token_id = $1 AND rotated_to IS NULL AND revoked = FALSE
            "#,
        )
        .bind(token_id)
        .bind(successor.token_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (token_id, principal_id, family_id, token_hash, issued_at, expires_at, rotated_to, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, FALSE)
            "#,
        )
        .bind(successor.token_id)
        .bind(successor.principal_id)
        .bind(successor.family_id)
        .bind(&successor.token_hash)
        .bind(successor.issued_at)
        .bind(successor.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke(&self, token_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_family(&self, family_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE family_id = $1 AND revoked = FALSE",
        )
        .bind(family_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn push_audit_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    if let Some(actor) = filter.actor_principal_id {
        builder.push(" AND actor_principal_id = ");
        builder.push_bind(actor);
    }
    if let Some(action) = &filter.action {
        builder.push(" AND action = ");
        builder.push_bind(action.clone());
    }
    if let Some(entity_type) = &filter.entity_type {
        builder.push(" AND entity_type = ");
        builder.push_bind(entity_type.clone());
    }
    if let Some(entity_id) = &filter.entity_id {
        builder.push(" AND entity_id = ");
        builder.push_bind(entity_id.clone());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND created_at <= ");
        builder.push_bind(end);
    }
}

#[async_trait]
impl AuditStore for Database {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, actor_principal_id, action, entity_type, entity_id,
                 changes, metadata, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_principal_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.changes)
        .bind(&entry.metadata)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<AuditLogEntry>, i64)> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log WHERE TRUE");
        push_audit_filter(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_builder =
            QueryBuilder::<Postgres>::new("SELECT * FROM audit_log WHERE TRUE");
        push_audit_filter(&mut page_builder, filter);
        page_builder.push(" ORDER BY created_at DESC OFFSET ");
        page_builder.push_bind(offset.max(0));
        page_builder.push(" LIMIT ");
        page_builder.push_bind(limit.max(0));

        let entries = page_builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total))
    }
}

#[async_trait]
impl RateLimitStore for Database {
    async fn incr(
        &self,
        scope: &str,
        identity: &str,
        window_seconds: i64,
    ) -> StoreResult<RateLimitBucket> {
        // Single upsert so two concurrent attempts cannot both observe the
        // pre-increment count.
        let bucket = sqlx::query_as::<_, RateLimitBucket>(
            r#"
            INSERT INTO rate_limit_buckets (scope, identity, count, window_start)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (scope, identity) DO UPDATE SET
                count = CASE
                    WHEN rate_limit_buckets.window_start <= NOW() - make_interval(secs => $3)
                    THEN 1
                    ELSE rate_limit_buckets.count + 1
                END,
                window_start = CASE
                    WHEN rate_limit_buckets.window_start <= NOW() - make_interval(secs => $3)
                    THEN NOW()
                    ELSE rate_limit_buckets.window_start
                END
            RETURNING count, window_start
            "#,
        )
        .bind(scope)
        .bind(identity)
        .bind(window_seconds as f64)
        .fetch_one(&self.pool)
        .await?;
        Ok(bucket)
    }

    async fn get(&self, scope: &str, identity: &str) -> StoreResult<Option<RateLimitBucket>> {
        let bucket = sqlx::query_as::<_, RateLimitBucket>(
            "SELECT count, window_start FROM rate_limit_buckets WHERE scope = $1 AND identity = $2",
        )
        .bind(scope)
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bucket)
    }

    async fn clear(&self, scope: &str, identity: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM rate_limit_buckets WHERE scope = $1 AND identity = $2")
            .bind(scope)
            .bind(identity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
