//! Static permission registry.
//!
//! Permissions are a closed enumeration: a mistyped key fails at compile time
//! at call sites and at process startup for role rows loaded from storage,
//! instead of silently always-denying at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Atomic capability key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionKey {
    MembersView,
    MembersEdit,
    FinancesView,
    FinancesEdit,
    BudgetsApprove,
    EventsView,
    EventsManage,
    AuditView,
    RolesManage,
}

impl PermissionKey {
    /// Every key in the registry, in declaration order.
    pub const ALL: [PermissionKey; 9] = [
        PermissionKey::MembersView,
        PermissionKey::MembersEdit,
        PermissionKey::FinancesView,
        PermissionKey::FinancesEdit,
        PermissionKey::BudgetsApprove,
        PermissionKey::EventsView,
        PermissionKey::EventsManage,
        PermissionKey::AuditView,
        PermissionKey::RolesManage,
    ];

    pub fn as_key(&self) -> &'static str {
        match self {
            PermissionKey::MembersView => "members.view",
            PermissionKey::MembersEdit => "members.edit",
            PermissionKey::FinancesView => "finances.view",
            PermissionKey::FinancesEdit => "finances.edit",
            PermissionKey::BudgetsApprove => "budgets.approve",
            PermissionKey::EventsView => "events.view",
            PermissionKey::EventsManage => "events.manage",
            PermissionKey::AuditView => "audit.view",
            PermissionKey::RolesManage => "roles.manage",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_key() == key)
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

impl From<PermissionKey> for String {
    fn from(key: PermissionKey) -> Self {
        key.as_key().to_string()
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = UnknownPermissionKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PermissionKey::from_key(&value).ok_or(UnknownPermissionKey(value))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission key: {0}")]
pub struct UnknownPermissionKey(pub String);

/// Validate stored role-permission rows against the registry.
///
/// Called once at startup so a bad row aborts boot instead of denying
/// requests forever.
pub fn validate_registry<'a, I>(stored_keys: I) -> Result<(), UnknownPermissionKey>
where
    I: IntoIterator<Item = &'a str>,
{
    for key in stored_keys {
        if PermissionKey::from_key(key).is_none() {
            return Err(UnknownPermissionKey(key.to_string()));
        }
    }
    Ok(())
}
