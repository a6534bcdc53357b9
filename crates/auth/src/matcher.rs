//! Permission matcher: evaluates held grants (including wildcards) against a
//! requirement.
//!
//! Every function here is pure. Inputs are immutable, so any number of request
//! threads may call them concurrently.

use tracing::debug;

use crate::permissions::{Permission, PermissionSet, WILDCARD};

/// True iff some held grant satisfies `required` (see [`Permission::grants`]).
///
/// An empty held set never matches.
pub fn has_permission(held: &PermissionSet, required: &Permission) -> bool {
    if held.is_empty() {
        return false;
    }
    if held.contains(required) {
        return true;
    }
    held.iter().any(|grant| grant.grants(required))
}

/// String-boundary variant of [`has_permission`].
///
/// A blank or malformed requirement matches nothing.
pub fn has_permission_str(held: &PermissionSet, required: &str) -> bool {
    if required.trim().is_empty() {
        return false;
    }
    match Permission::parse(required) {
        Ok(required) => has_permission(held, &required),
        Err(err) => {
            debug!(required, error = %err, "rejecting malformed permission requirement");
            false
        }
    }
}

/// True iff every entry of `required` is satisfied.
///
/// Vacuously true for an empty list: nothing is missing.
pub fn has_all_permissions(held: &PermissionSet, required: &[Permission]) -> bool {
    required.iter().all(|p| has_permission(held, p))
}

/// True iff at least one entry of `required` is satisfied.
///
/// False for an empty list: there is nothing to satisfy.
pub fn has_any_permission(held: &PermissionSet, required: &[Permission]) -> bool {
    required.iter().any(|p| has_permission(held, p))
}

/// True iff any grant's resource is `resource`, `*`, or the grant is `*:*`.
pub fn has_domain_permission(held: &PermissionSet, resource: &str) -> bool {
    if resource.is_empty() {
        return false;
    }
    held.iter()
        .any(|grant| grant.resource() == resource || grant.resource() == WILDCARD)
}

/// True iff any grant's action is `action`, `*`, or the grant is `*:*`.
pub fn has_action_permission(held: &PermissionSet, action: &str) -> bool {
    if action.is_empty() {
        return false;
    }
    held.iter()
        .any(|grant| grant.action() == action || grant.action() == WILDCARD)
}

/// Required permissions not satisfied by `held`, in input order.
pub fn missing_permissions<'a>(held: &PermissionSet, required: &'a [Permission]) -> Vec<&'a Permission> {
    required
        .iter()
        .filter(|p| !has_permission(held, p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> PermissionSet {
        PermissionSet::parse_all(values).unwrap()
    }

    fn perm(value: &str) -> Permission {
        Permission::parse(value).unwrap()
    }

    #[test]
    fn empty_held_set_matches_nothing() {
        assert!(!has_permission(&PermissionSet::new(), &perm("user:read")));
        assert!(!has_permission(&PermissionSet::new(), &Permission::all()));
    }

    #[test]
    fn resource_wildcard_is_scoped_to_its_resource() {
        let held = set(&["user:*"]);
        assert!(has_permission(&held, &perm("user:read")));
        assert!(has_permission(&held, &perm("user:delete")));
        assert!(!has_permission(&held, &perm("role:read")));
    }

    #[test]
    fn action_wildcard_is_scoped_to_its_action() {
        let held = set(&["*:read"]);
        assert!(has_permission(&held, &perm("tenant:read")));
        assert!(!has_permission(&held, &perm("tenant:update")));
    }

    #[test]
    fn string_requirement_rejects_blank_and_malformed() {
        let held = set(&["*:*"]);
        assert!(has_permission_str(&held, "user:read"));
        assert!(!has_permission_str(&held, ""));
        assert!(!has_permission_str(&held, "   "));
        assert!(!has_permission_str(&held, "no-separator"));
    }

    #[test]
    fn all_and_any_on_empty_lists() {
        let held = set(&["user:read"]);
        assert!(has_all_permissions(&held, &[]));
        assert!(!has_any_permission(&held, &[]));
    }

    #[test]
    fn all_requires_every_entry() {
        let held = set(&["user:read", "role:*"]);
        assert!(has_all_permissions(&held, &[perm("user:read"), perm("role:assign")]));
        assert!(!has_all_permissions(&held, &[perm("user:read"), perm("user:update")]));
        assert!(has_any_permission(&held, &[perm("user:update"), perm("role:read")]));
        assert!(!has_any_permission(&held, &[perm("user:update"), perm("tenant:read")]));
    }

    #[test]
    fn domain_and_action_permissions() {
        let held = set(&["user:read"]);
        assert!(has_domain_permission(&held, "user"));
        assert!(!has_domain_permission(&held, "role"));
        assert!(has_action_permission(&held, "read"));
        assert!(!has_action_permission(&held, "delete"));

        let global = set(&["*:*"]);
        assert!(has_domain_permission(&global, "anything"));
        assert!(has_action_permission(&global, "anything"));

        let any_read = set(&["*:read"]);
        assert!(has_domain_permission(&any_read, "tenant"));
        assert!(!has_action_permission(&any_read, "update"));

        assert!(!has_domain_permission(&global, ""));
    }

    #[test]
    fn missing_permissions_lists_unsatisfied_entries() {
        let held = set(&["user:*"]);
        let required = [perm("user:read"), perm("role:read"), perm("tenant:read")];
        let missing = missing_permissions(&held, &required);
        assert_eq!(missing, vec![&required[1], &required[2]]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn segment() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_-]{0,29}"
        }

        fn permission() -> impl Strategy<Value = Permission> {
            (segment(), segment()).prop_map(|(r, a)| Permission::from_parts(&r, &a).unwrap())
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                .. ProptestConfig::default()
            })]

            #[test]
            fn held_permission_is_reflexive(p in permission()) {
                let held: PermissionSet = [p.clone()].into_iter().collect();
                prop_assert!(has_permission(&held, &p));
            }

            #[test]
            fn global_wildcard_matches_everything(p in permission()) {
                let held: PermissionSet = [Permission::all()].into_iter().collect();
                prop_assert!(has_permission(&held, &p));
            }

            #[test]
            fn empty_set_matches_nothing(p in permission()) {
                prop_assert!(!has_permission(&PermissionSet::new(), &p));
            }

            #[test]
            fn resource_wildcard_matches_only_same_resource(p in permission(), other in segment()) {
                let grant = Permission::from_parts(p.resource(), "*").unwrap();
                let held: PermissionSet = [grant].into_iter().collect();
                prop_assert!(has_permission(&held, &p));

                let foreign = Permission::from_parts(&other, p.action()).unwrap();
                prop_assert_eq!(has_permission(&held, &foreign), other == p.resource());
            }
        }
    }
}
