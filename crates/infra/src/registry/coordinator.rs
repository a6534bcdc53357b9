//! Sync coordinator: reconciles one service's registrations with a manifest.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use warden_registry::{ScannedEndpoint, ServiceManifest, SyncResult, plan_sync};

use super::{EndpointPermissionStore, RegistryError};

/// Loads current registrations, plans the reconciliation, and applies it as
/// one unit.
///
/// Syncs of the same service must not overlap; if they do, the loser fails
/// with `Conflict` on the version check and may simply be retried.
#[derive(Debug, Clone)]
pub struct SyncCoordinator<S> {
    store: S,
}

impl<S: EndpointPermissionStore> SyncCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn coordinate(&self, service_name: &str, scanned: &[ScannedEndpoint]) -> Result<SyncResult, RegistryError> {
        self.coordinate_at(service_name, scanned, Utc::now())
    }

    pub fn coordinate_manifest(&self, manifest: &ServiceManifest) -> Result<SyncResult, RegistryError> {
        self.coordinate(&manifest.service_name, &manifest.endpoints)
    }

    #[instrument(skip(self, scanned), fields(service = service_name, scanned = scanned.len()), err)]
    pub fn coordinate_at(
        &self,
        service_name: &str,
        scanned: &[ScannedEndpoint],
        now: DateTime<Utc>,
    ) -> Result<SyncResult, RegistryError> {
        warden_registry::endpoint::validate_service_name(service_name)?;
        for entry in scanned {
            entry.key(service_name)?;
        }

        let existing = self.store.list_by_service(service_name)?;
        let plan = plan_sync(service_name, existing, scanned, now)?;

        if plan.has_writes() {
            self.store.apply_sync(&plan)?;
        }

        let result = plan.result;
        if result.stale > 0 {
            warn!(
                stale = result.stale,
                keys = ?result.stale_keys,
                "registered endpoints missing from manifest; left in place"
            );
        }
        info!(
            created = result.created,
            updated = result.updated,
            unchanged = result.unchanged,
            stale = result.stale,
            total = result.total,
            "endpoint sync completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::{Permission, Role};
    use warden_core::AggregateRoot;
    use warden_registry::HttpMethod;

    use crate::registry::InMemoryEndpointPermissionStore;

    const SERVICE: &str = "user-service";

    fn coordinator() -> SyncCoordinator<std::sync::Arc<InMemoryEndpointPermissionStore>> {
        SyncCoordinator::new(InMemoryEndpointPermissionStore::arc())
    }

    fn manifest() -> Vec<ScannedEndpoint> {
        vec![
            ScannedEndpoint::new("/api/v1/users", HttpMethod::Get)
                .with_description("List users")
                .with_permissions([Permission::parse("user:read").unwrap()]),
            ScannedEndpoint::new("/api/v1/users", HttpMethod::Post)
                .with_description("Create user")
                .with_permissions([Permission::parse("user:create").unwrap()])
                .with_roles([Role::new("admin")]),
            ScannedEndpoint::new("/health", HttpMethod::Get).public(),
        ]
    }

    #[test]
    fn second_identical_sync_is_idle() {
        let c = coordinator();
        let first = c.coordinate(SERVICE, &manifest()).unwrap();
        assert_eq!(first.created, 3);

        let second = c.coordinate(SERVICE, &manifest()).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 3);
        assert_eq!(second.total, 3);
    }

    #[test]
    fn changed_entry_is_updated_and_versioned() {
        let c = coordinator();
        c.coordinate(SERVICE, &manifest()).unwrap();

        let mut changed = manifest();
        changed[0] = changed[0].clone().with_description("List all users");
        let result = c.coordinate(SERVICE, &changed).unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(result.unchanged, 2);

        let stored = c
            .store()
            .find_by_key(SERVICE, "/api/v1/users", HttpMethod::Get)
            .unwrap()
            .unwrap();
        assert_eq!(stored.description(), "List all users");
        assert_eq!(stored.version(), 1);
    }

    #[test]
    fn dropped_entry_is_stale_but_kept() {
        let c = coordinator();
        c.coordinate(SERVICE, &manifest()).unwrap();

        let result = c.coordinate(SERVICE, &manifest()[..2]).unwrap();
        assert_eq!(result.stale, 1);
        assert_eq!(result.stale_keys[0].http_path, "/health");
        assert!(c.store().exists_by_key(SERVICE, "/health", HttpMethod::Get).unwrap());
    }

    #[test]
    fn invalid_manifest_writes_nothing() {
        let c = coordinator();
        let mut bad = manifest();
        bad.push(ScannedEndpoint::new("relative", HttpMethod::Get));

        assert!(matches!(c.coordinate(SERVICE, &bad), Err(RegistryError::Validation(_))));
        assert!(c.store().list_by_service(SERVICE).unwrap().is_empty());
        assert!(matches!(c.coordinate("", &manifest()), Err(RegistryError::Validation(_))));
    }

    #[test]
    fn duplicate_route_in_manifest_registers_once() {
        let c = coordinator();
        let mut dup = manifest();
        dup.push(dup[0].clone().with_description("Duplicate"));

        let result = c.coordinate(SERVICE, &dup).unwrap();
        assert_eq!(result.created, 3);
        assert_eq!(result.updated, 1);
        assert_eq!(c.store().list_by_service(SERVICE).unwrap().len(), 3);
    }

    #[test]
    fn duplicate_route_manifest_settles_on_rerun() {
        let c = coordinator();
        let dup = vec![
            ScannedEndpoint::new("/a", HttpMethod::Get).with_description("one"),
            ScannedEndpoint::new("/a", HttpMethod::Get).with_description("two"),
        ];

        let first = c.coordinate(SERVICE, &dup).unwrap();
        assert_eq!(first.created, 1);

        let second = c.coordinate(SERVICE, &dup).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 2);

        let stored = c.store().find_by_key(SERVICE, "/a", HttpMethod::Get).unwrap().unwrap();
        assert_eq!(stored.description(), "two");
        assert_eq!(stored.version(), 0);
    }

    #[test]
    fn services_are_independent() {
        let c = coordinator();
        c.coordinate(SERVICE, &manifest()).unwrap();
        let other = c.coordinate("billing", &manifest()[..1]).unwrap();
        assert_eq!(other.created, 1);
        assert_eq!(other.stale, 0);
        assert_eq!(c.store().list_by_service(SERVICE).unwrap().len(), 3);
    }
}
