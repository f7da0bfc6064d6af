pub mod audit;
pub mod permission;
pub mod principal;
pub mod refresh_token;
pub mod role;

pub use audit::{AuditFilter, AuditLogEntry};
pub use permission::{validate_registry, PermissionKey, UnknownPermissionKey};
pub use principal::{Principal, PrincipalResponse};
pub use refresh_token::RefreshTokenRecord;
pub use role::{Role, RoleAssignment};
