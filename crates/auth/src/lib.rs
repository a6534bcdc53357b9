//! `warden-auth`: pure authorization boundary.
//!
//! Permission matching, scope validation and revocation value types. This
//! crate is intentionally decoupled from HTTP and storage.

pub mod actor;
pub mod authorize;
pub mod catalog;
pub mod matcher;
pub mod permissions;
pub mod revocation;
pub mod roles;
pub mod scope;
pub mod validator;

pub use actor::ActorContext;
pub use authorize::{AuthzError, authorize, authorize_all, require_scope, require_tenant};
pub use matcher::{
    has_action_permission, has_all_permissions, has_any_permission, has_domain_permission,
    has_permission, has_permission_str,
};
pub use permissions::{Permission, PermissionParseError, PermissionSet};
pub use revocation::{BlacklistedToken, Jti, RevocationReason};
pub use roles::Role;
pub use scope::{Scope, has_sufficient_scope};
pub use validator::{can_access_organization, can_access_tenant, can_access_user};
