use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{OrganizationId, TenantId, UserId};

use crate::{Permission, PermissionSet, Role, Scope};

/// Authenticated actor for one request.
///
/// Built once per request by the token verifier and read-only afterwards.
/// Tenant and organization ids are `None` for actors that are not bound to
/// one (a `GLOBAL` operator has neither).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub organization_id: Option<OrganizationId>,
    pub scope: Scope,
    pub permissions: PermissionSet,
    pub roles: BTreeSet<Role>,
}

impl ActorContext {
    pub fn global(user_id: UserId) -> Self {
        Self {
            user_id,
            tenant_id: None,
            organization_id: None,
            scope: Scope::Global,
            permissions: PermissionSet::new(),
            roles: BTreeSet::new(),
        }
    }

    pub fn tenant(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            scope: Scope::Tenant,
            ..Self::global(user_id)
        }
    }

    pub fn organization(user_id: UserId, tenant_id: TenantId, organization_id: OrganizationId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            organization_id: Some(organization_id),
            scope: Scope::Organization,
            ..Self::global(user_id)
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}
