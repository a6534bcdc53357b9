use thiserror::Error;

use warden_core::TenantId;

use crate::matcher::{has_permission, missing_permissions};
use crate::validator::can_access_tenant;
use crate::{ActorContext, Permission, Scope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: requires one of roles {0:?}")]
    MissingRole(Vec<String>),

    #[error("insufficient scope: {actual} cannot act at {required} scope")]
    InsufficientScope { actual: Scope, required: Scope },
}

/// Authorize an actor for a single permission.
///
/// - No IO
/// - No panics
pub fn authorize(actor: &ActorContext, required: &Permission) -> Result<(), AuthzError> {
    if has_permission(&actor.permissions, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize an actor for every listed permission, reporting the first missing one.
pub fn authorize_all(actor: &ActorContext, required: &[Permission]) -> Result<(), AuthzError> {
    match missing_permissions(&actor.permissions, required).first() {
        Some(missing) => Err(AuthzError::Forbidden(missing.as_str().to_string())),
        None => Ok(()),
    }
}

pub fn require_scope(actor: &ActorContext, required: Scope) -> Result<(), AuthzError> {
    if actor.scope.covers(required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientScope {
            actual: actor.scope,
            required,
        })
    }
}

pub fn require_tenant(actor: &ActorContext, target: Option<TenantId>) -> Result<(), AuthzError> {
    if can_access_tenant(actor, target) {
        Ok(())
    } else {
        Err(AuthzError::TenantMismatch)
    }
}
