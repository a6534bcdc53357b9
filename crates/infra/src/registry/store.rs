use std::sync::Arc;

use chrono::{DateTime, Utc};

use warden_registry::{EndpointKey, EndpointPermission, EndpointPermissionId, HttpMethod, SyncPlan};

use super::RegistryError;

/// Endpoint permission registry storage.
///
/// Natural keys are unique among non-deleted registrations. Lookups by key
/// and service listings skip deleted rows; lookup by id does not.
pub trait EndpointPermissionStore: Send + Sync {
    /// Insert a new registration. `Conflict` when the key is already taken.
    fn create(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError>;

    /// Persist a new snapshot of an existing registration.
    ///
    /// The stored version must equal the snapshot's version; the returned
    /// snapshot carries the incremented version. `Conflict` on a stale
    /// version or when another live registration holds the key.
    fn update(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError>;

    /// Mark a registration deleted. Rows are never removed.
    fn soft_delete(&self, id: EndpointPermissionId, now: DateTime<Utc>) -> Result<EndpointPermission, RegistryError>;

    fn get(&self, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError>;

    fn find_by_key(
        &self,
        service_name: &str,
        http_path: &str,
        http_method: HttpMethod,
    ) -> Result<Option<EndpointPermission>, RegistryError>;

    fn exists_by_key(&self, service_name: &str, http_path: &str, http_method: HttpMethod) -> Result<bool, RegistryError> {
        Ok(self.find_by_key(service_name, http_path, http_method)?.is_some())
    }

    /// Live registrations of one service, in [`super::query::listing_order`].
    fn list_by_service(&self, service_name: &str) -> Result<Vec<EndpointPermission>, RegistryError>;

    /// Apply every write of a plan, or none of them.
    fn apply_sync(&self, plan: &SyncPlan) -> Result<(), RegistryError>;
}

impl<S: EndpointPermissionStore + ?Sized> EndpointPermissionStore for Arc<S> {
    fn create(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        (**self).create(endpoint)
    }

    fn update(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        (**self).update(endpoint)
    }

    fn soft_delete(&self, id: EndpointPermissionId, now: DateTime<Utc>) -> Result<EndpointPermission, RegistryError> {
        (**self).soft_delete(id, now)
    }

    fn get(&self, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError> {
        (**self).get(id)
    }

    fn find_by_key(
        &self,
        service_name: &str,
        http_path: &str,
        http_method: HttpMethod,
    ) -> Result<Option<EndpointPermission>, RegistryError> {
        (**self).find_by_key(service_name, http_path, http_method)
    }

    fn exists_by_key(&self, service_name: &str, http_path: &str, http_method: HttpMethod) -> Result<bool, RegistryError> {
        (**self).exists_by_key(service_name, http_path, http_method)
    }

    fn list_by_service(&self, service_name: &str) -> Result<Vec<EndpointPermission>, RegistryError> {
        (**self).list_by_service(service_name)
    }

    fn apply_sync(&self, plan: &SyncPlan) -> Result<(), RegistryError> {
        (**self).apply_sync(plan)
    }
}

pub(crate) fn duplicate_key(key: &EndpointKey) -> RegistryError {
    RegistryError::Conflict(format!("endpoint permission already registered for {key}"))
}
