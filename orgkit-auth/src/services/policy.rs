//! Permission resolution over the role directory.
//!
//! A principal has at most one active role assignment; the effective
//! permission set is the flat set of keys granted to that role. Resolution
//! results are cached per principal and invalidated on assignment changes.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::PermissionKey;
use crate::services::AuthError;
use crate::stores::DirectoryStore;

#[derive(Clone)]
pub struct PermissionResolver {
    directory: Arc<dyn DirectoryStore>,
    cache: Arc<DashMap<Uuid, Arc<HashSet<PermissionKey>>>>,
}

impl PermissionResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self {
            directory,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// The flat permission set of the principal's active role. Empty when no
    /// assignment is active.
    pub async fn resolve_effective(
        &self,
        principal_id: Uuid,
    ) -> Result<Arc<HashSet<PermissionKey>>, AuthError> {
        if let Some(cached) = self.cache.get(&principal_id) {
            return Ok(cached.clone());
        }

        let mut effective = HashSet::new();
        if let Some(assignment) = self
            .directory
            .active_assignment(principal_id)
            .await
            .map_err(AuthError::Store)?
        {
            let keys = self
                .directory
                .role_permissions(assignment.role_id)
                .await
                .map_err(AuthError::Store)?;
            for key in keys {
                // Stored keys outside the registry indicate a corrupted
                // directory; resolution must not silently narrow grants.
                let permission = PermissionKey::from_key(&key).ok_or_else(|| {
                    AuthError::Internal(anyhow::anyhow!("unknown permission key: {key}"))
                })?;
                effective.insert(permission);
            }
        }

        let effective = Arc::new(effective);
        self.cache.insert(principal_id, effective.clone());
        Ok(effective)
    }

    /// Does the principal hold `permission`?
    pub async fn authorize(
        &self,
        principal_id: Uuid,
        permission: PermissionKey,
    ) -> Result<bool, AuthError> {
        Ok(self.resolve_effective(principal_id).await?.contains(&permission))
    }

    /// Like [`authorize`](Self::authorize) but failing closed.
    pub async fn require(
        &self,
        principal_id: Uuid,
        permission: PermissionKey,
    ) -> Result<(), AuthError> {
        if self.authorize(principal_id, permission).await? {
            Ok(())
        } else {
            tracing::debug!(
                %principal_id,
                permission = permission.as_key(),
                "Permission check failed"
            );
            Err(AuthError::PermissionDenied)
        }
    }

    /// Drop one principal's cached set; call after assignment changes.
    pub fn invalidate(&self, principal_id: Uuid) {
        self.cache.remove(&principal_id);
    }

    /// Drop every cached set; call after role permission edits.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Startup check that every stored permission key names a registry
    /// entry, so a bad migration fails the boot instead of a request.
    pub async fn validate_registry(&self) -> Result<(), AuthError> {
        let keys = self
            .directory
            .all_role_permission_keys()
            .await
            .map_err(AuthError::Store)?;
        crate::models::validate_registry(keys.iter().map(String::as_str))
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }
}
