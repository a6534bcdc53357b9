//! Scope validator: cross-tenant and cross-organization access decisions.
//!
//! All checks are pure and fail closed. A missing identifier on either side
//! means access cannot be proven, so the answer is `false`.

use warden_core::{OrganizationId, TenantId, UserId};

use crate::{ActorContext, Scope};

/// `GLOBAL` actors may access any tenant; everyone else only their own.
pub fn can_access_tenant(actor: &ActorContext, target_tenant_id: Option<TenantId>) -> bool {
    if actor.scope == Scope::Global {
        return true;
    }
    same_id(actor.tenant_id, target_tenant_id)
}

/// `TENANT` actors compare tenant only; `ORGANIZATION` actors need both ids
/// to match.
pub fn can_access_organization(
    actor: &ActorContext,
    target_tenant_id: Option<TenantId>,
    target_organization_id: Option<OrganizationId>,
) -> bool {
    match actor.scope {
        Scope::Global => true,
        Scope::Tenant => {
            target_organization_id.is_some() && same_id(actor.tenant_id, target_tenant_id)
        }
        Scope::Organization => {
            same_id(actor.tenant_id, target_tenant_id)
                && same_id(actor.organization_id, target_organization_id)
        }
    }
}

/// Self-access is always permitted; otherwise delegates by scope.
pub fn can_access_user(
    actor: &ActorContext,
    target_user_id: Option<UserId>,
    target_tenant_id: Option<TenantId>,
    target_organization_id: Option<OrganizationId>,
) -> bool {
    if target_user_id == Some(actor.user_id) {
        return true;
    }
    match actor.scope {
        Scope::Global => true,
        Scope::Tenant => can_access_tenant(actor, target_tenant_id),
        Scope::Organization => {
            can_access_organization(actor, target_tenant_id, target_organization_id)
        }
    }
}

fn same_id<T: PartialEq>(actual: Option<T>, target: Option<T>) -> bool {
    matches!((actual, target), (Some(a), Some(t)) if a == t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_actor(tenant: TenantId) -> ActorContext {
        ActorContext::tenant(UserId::new(), tenant)
    }

    fn org_actor(tenant: TenantId, org: OrganizationId) -> ActorContext {
        ActorContext::organization(UserId::new(), tenant, org)
    }

    #[test]
    fn global_actor_accesses_any_tenant() {
        let actor = ActorContext::global(UserId::new());
        assert!(can_access_tenant(&actor, Some(TenantId::new())));
        assert!(can_access_organization(&actor, Some(TenantId::new()), Some(OrganizationId::new())));
    }

    #[test]
    fn tenant_actor_is_confined_to_its_tenant() {
        let tenant = TenantId::new();
        let actor = tenant_actor(tenant);
        assert!(can_access_tenant(&actor, Some(tenant)));
        assert!(!can_access_tenant(&actor, Some(TenantId::new())));
        // Organization ids are not compared for tenant-scoped actors.
        assert!(can_access_organization(&actor, Some(tenant), Some(OrganizationId::new())));
        assert!(!can_access_organization(&actor, Some(TenantId::new()), Some(OrganizationId::new())));
    }

    #[test]
    fn organization_actor_needs_both_ids_to_match() {
        let tenant = TenantId::new();
        let org = OrganizationId::new();
        let actor = org_actor(tenant, org);
        assert!(can_access_organization(&actor, Some(tenant), Some(org)));
        assert!(!can_access_organization(&actor, Some(tenant), Some(OrganizationId::new())));
        assert!(!can_access_organization(&actor, Some(TenantId::new()), Some(org)));
    }

    #[test]
    fn missing_ids_fail_closed() {
        let tenant = TenantId::new();
        let org = OrganizationId::new();

        assert!(!can_access_tenant(&tenant_actor(tenant), None));
        assert!(!can_access_organization(&tenant_actor(tenant), Some(tenant), None));
        assert!(!can_access_organization(&org_actor(tenant, org), None, Some(org)));
        assert!(!can_access_organization(&org_actor(tenant, org), Some(tenant), None));

        let mut unbound = tenant_actor(tenant);
        unbound.tenant_id = None;
        assert!(!can_access_tenant(&unbound, Some(tenant)));
        assert!(!can_access_user(&unbound, Some(UserId::new()), Some(tenant), None));
    }

    #[test]
    fn self_access_overrides_scope() {
        let actor = org_actor(TenantId::new(), OrganizationId::new());
        assert!(can_access_user(&actor, Some(actor.user_id), Some(TenantId::new()), None));
        assert!(can_access_user(&actor, Some(actor.user_id), None, None));
    }

    #[test]
    fn user_access_delegates_by_scope() {
        let tenant = TenantId::new();
        let org = OrganizationId::new();
        let other = Some(UserId::new());

        let global = ActorContext::global(UserId::new());
        assert!(can_access_user(&global, other, None, None));

        let t = tenant_actor(tenant);
        assert!(can_access_user(&t, other, Some(tenant), None));
        assert!(!can_access_user(&t, other, Some(TenantId::new()), None));

        let o = org_actor(tenant, org);
        assert!(can_access_user(&o, other, Some(tenant), Some(org)));
        assert!(!can_access_user(&o, other, Some(tenant), Some(OrganizationId::new())));
        assert!(!can_access_user(&o, None, Some(tenant), Some(OrganizationId::new())));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use uuid::Uuid;

        fn tenant_id() -> impl Strategy<Value = TenantId> {
            any::<u128>().prop_map(|n| TenantId::from_uuid(Uuid::from_u128(n)))
        }

        fn org_id() -> impl Strategy<Value = OrganizationId> {
            any::<u128>().prop_map(|n| OrganizationId::from_uuid(Uuid::from_u128(n)))
        }

        proptest! {
            #[test]
            fn global_scope_reaches_every_tenant(t in tenant_id()) {
                let actor = ActorContext::global(UserId::new());
                prop_assert!(can_access_tenant(&actor, Some(t)));
            }

            #[test]
            fn organization_scope_never_reaches_another_org(t in tenant_id(), own in org_id(), other in org_id()) {
                prop_assume!(own != other);
                let actor = ActorContext::organization(UserId::new(), t, own);
                prop_assert!(!can_access_organization(&actor, Some(t), Some(other)));
            }
        }
    }
}
