//! In-memory store implementations.
//!
//! Used by tests and local development. Atomicity requirements are met by
//! holding the mutex across each read-modify-write.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    AuditFilter, AuditLogEntry, Principal, RefreshTokenRecord, Role, RoleAssignment,
};

use super::{
    AuditStore, DirectoryStore, RateLimitBucket, RateLimitStore, StoreResult, TokenStore,
};

fn lock_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("Store mutex poisoned: {}", e)
}

#[derive(Default)]
struct DirectoryState {
    principals: Vec<Principal>,
    roles: Vec<Role>,
    role_permissions: HashMap<Uuid, Vec<String>>,
    assignments: Vec<RoleAssignment>,
}

#[derive(Default)]
pub struct InMemoryDirectoryStore {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn find_principal_by_identifier(
        &self,
        identifier: &str,
    ) -> StoreResult<Option<Principal>> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state
            .principals
            .iter()
            .find(|p| p.display_identifier == identifier)
            .cloned())
    }

    async fn find_principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state.principals.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_principal(&self, principal: &Principal) -> StoreResult<()> {
        let mut state = self.state.lock().map_err(lock_err)?;
        if state
            .principals
            .iter()
            .any(|p| p.display_identifier == principal.display_identifier)
        {
            anyhow::bail!("identifier already registered");
        }
        state.principals.push(principal.clone());
        Ok(())
    }

    async fn insert_role(&self, role: &Role, permission_keys: &[String]) -> StoreResult<()> {
        let mut state = self.state.lock().map_err(lock_err)?;
        state.roles.push(role.clone());
        state
            .role_permissions
            .insert(role.id, permission_keys.to_vec());
        Ok(())
    }

    async fn active_assignment(&self, principal_id: Uuid) -> StoreResult<Option<RoleAssignment>> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state
            .assignments
            .iter()
            .find(|a| a.principal_id == principal_id && a.is_active())
            .cloned())
    }

    async fn assign_role(&self, principal_id: Uuid, role_id: Uuid) -> StoreResult<RoleAssignment> {
        let mut state = self.state.lock().map_err(lock_err)?;
        let now = Utc::now();
        for assignment in state
            .assignments
            .iter_mut()
            .filter(|a| a.principal_id == principal_id && a.is_active())
        {
            assignment.ended_at = Some(now);
        }
        let assignment = RoleAssignment::new(principal_id, role_id);
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn role_permissions(&self, role_id: Uuid) -> StoreResult<Vec<String>> {
        let state = self.state.lock().map_err(lock_err)?;
        Ok(state
            .role_permissions
            .get(&role_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn all_role_permission_keys(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().map_err(lock_err)?;
        let mut keys: Vec<String> = state
            .role_permissions
            .values()
            .flatten()
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    records: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        let mut records = self.records.lock().map_err(lock_err)?;
        records.insert(record.token_id, record.clone());
        Ok(())
    }

    async fn find(&self, token_id: Uuid) -> StoreResult<Option<RefreshTokenRecord>> {
        let records = self.records.lock().map_err(lock_err)?;
        Ok(records.get(&token_id).cloned())
    }

    async fn rotate(&self, token_id: Uuid, successor: &RefreshTokenRecord) -> StoreResult<bool> {
        // Single lock across check + update + insert makes this a CAS
        let mut records = self.records.lock().map_err(lock_err)?;
        match records.get_mut(&token_id) {
            Some(record) if record.rotated_to.is_none() && !record.revoked => {
                record.rotated_to = Some(successor.token_id);
                records.insert(successor.token_id, successor.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, token_id: Uuid) -> StoreResult<()> {
        let mut records = self.records.lock().map_err(lock_err)?;
        if let Some(record) = records.get_mut(&token_id) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_family(&self, family_id: Uuid) -> StoreResult<u64> {
        let mut records = self.records.lock().map_err(lock_err)?;
        let mut changed = 0;
        for record in records
            .values_mut()
            .filter(|r| r.family_id == family_id && !r.revoked)
        {
            record.revoked = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(lock_err)?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn search(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<AuditLogEntry>, i64)> {
        let entries = self.entries.lock().map_err(lock_err)?;
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct InMemoryRateLimitStore {
    buckets: Mutex<HashMap<(String, String), RateLimitBucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn incr(
        &self,
        scope: &str,
        identity: &str,
        window_seconds: i64,
    ) -> StoreResult<RateLimitBucket> {
        let mut buckets = self.buckets.lock().map_err(lock_err)?;
        let now = Utc::now();
        let bucket = buckets
            .entry((scope.to_string(), identity.to_string()))
            .or_insert(RateLimitBucket {
                count: 0,
                window_start: now,
            });

        if bucket.window_expired(window_seconds, now) {
            bucket.count = 0;
            bucket.window_start = now;
        }
        bucket.count += 1;
        Ok(*bucket)
    }

    async fn get(&self, scope: &str, identity: &str) -> StoreResult<Option<RateLimitBucket>> {
        let buckets = self.buckets.lock().map_err(lock_err)?;
        Ok(buckets
            .get(&(scope.to_string(), identity.to_string()))
            .copied())
    }

    async fn clear(&self, scope: &str, identity: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().map_err(lock_err)?;
        buckets.remove(&(scope.to_string(), identity.to_string()));
        Ok(())
    }
}
