//! Well-known permission strings shared with the request-authorization layer.
//!
//! These are configuration data. Every entry parses as a valid [`Permission`].

use crate::Permission;

pub const ALL: &str = "*:*";

pub const USER_READ: &str = "user:read";
pub const USER_CREATE: &str = "user:create";
pub const USER_UPDATE: &str = "user:update";
pub const USER_DELETE: &str = "user:delete";
pub const USER_ALL: &str = "user:*";

pub const ROLE_READ: &str = "role:read";
pub const ROLE_CREATE: &str = "role:create";
pub const ROLE_UPDATE: &str = "role:update";
pub const ROLE_DELETE: &str = "role:delete";
pub const ROLE_ASSIGN: &str = "role:assign";

pub const TENANT_READ: &str = "tenant:read";
pub const TENANT_CREATE: &str = "tenant:create";
pub const TENANT_UPDATE: &str = "tenant:update";
pub const TENANT_DELETE: &str = "tenant:delete";

pub const ORGANIZATION_READ: &str = "organization:read";
pub const ORGANIZATION_CREATE: &str = "organization:create";
pub const ORGANIZATION_UPDATE: &str = "organization:update";
pub const ORGANIZATION_DELETE: &str = "organization:delete";

pub const ENDPOINT_PERMISSION_READ: &str = "endpoint_permission:read";
pub const ENDPOINT_PERMISSION_MANAGE: &str = "endpoint_permission:manage";
pub const ENDPOINT_PERMISSION_SYNC: &str = "endpoint_permission:sync";

pub const TOKEN_REVOKE: &str = "token:revoke";

const CATALOG: &[&str] = &[
    ALL,
    USER_READ,
    USER_CREATE,
    USER_UPDATE,
    USER_DELETE,
    USER_ALL,
    ROLE_READ,
    ROLE_CREATE,
    ROLE_UPDATE,
    ROLE_DELETE,
    ROLE_ASSIGN,
    TENANT_READ,
    TENANT_CREATE,
    TENANT_UPDATE,
    TENANT_DELETE,
    ORGANIZATION_READ,
    ORGANIZATION_CREATE,
    ORGANIZATION_UPDATE,
    ORGANIZATION_DELETE,
    ENDPOINT_PERMISSION_READ,
    ENDPOINT_PERMISSION_MANAGE,
    ENDPOINT_PERMISSION_SYNC,
    TOKEN_REVOKE,
];

/// Every catalog entry, parsed.
pub fn all() -> Vec<Permission> {
    CATALOG
        .iter()
        .filter_map(|p| Permission::from_static(p).ok())
        .collect()
}
