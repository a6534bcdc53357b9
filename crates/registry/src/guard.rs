use warden_auth::{ActorContext, AuthzError, Permission, authorize_all};

use crate::endpoint::EndpointPermission;

/// Decide whether `actor` may call the registered endpoint.
///
/// Public endpoints admit everyone. Otherwise every required permission must
/// be held and, when roles are listed, at least one of them. A soft-deleted
/// registration admits nobody.
pub fn authorize_endpoint(endpoint: &EndpointPermission, actor: &ActorContext) -> Result<(), AuthzError> {
    if endpoint.is_deleted() {
        return Err(AuthzError::Forbidden(endpoint.key().to_string()));
    }
    if endpoint.is_public() {
        return Ok(());
    }

    let required: Vec<Permission> = endpoint.required_permissions().iter().cloned().collect();
    authorize_all(actor, &required)?;

    let roles = endpoint.required_roles();
    if roles.is_empty() || roles.iter().any(|r| actor.has_role(r)) {
        Ok(())
    } else {
        Err(AuthzError::MissingRole(roles.iter().map(|r| r.as_str().to_string()).collect()))
    }
}
