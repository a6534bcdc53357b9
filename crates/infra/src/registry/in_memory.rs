use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use warden_core::{AggregateRoot, ExpectedVersion};
use warden_registry::{EndpointKey, EndpointPermission, EndpointPermissionId, HttpMethod, SyncPlan};

use super::query::{EndpointFilter, EndpointPermissionQuery, EndpointQueryResult, Pagination, listing_order};
use super::store::duplicate_key;
use super::{EndpointPermissionStore, RegistryError};

#[derive(Debug, Clone, Default)]
struct State {
    rows: HashMap<EndpointPermissionId, EndpointPermission>,
    /// Natural key of every live row.
    live: HashMap<EndpointKey, EndpointPermissionId>,
}

impl State {
    fn insert_new(&mut self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        let id = endpoint.id_typed();
        if self.rows.contains_key(&id) {
            return Err(RegistryError::Conflict(format!("endpoint permission {id} already exists")));
        }
        if !endpoint.is_deleted() {
            if self.live.contains_key(endpoint.key()) {
                return Err(duplicate_key(endpoint.key()));
            }
            self.live.insert(endpoint.key().clone(), id);
        }
        self.rows.insert(id, endpoint.clone());
        Ok(endpoint)
    }

    fn replace(&mut self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        let id = endpoint.id_typed();
        let stored = self.rows.get(&id).ok_or(RegistryError::NotFound)?;

        ExpectedVersion::Exact(endpoint.version()).check(stored.version())?;
        if stored.is_deleted() {
            return Err(RegistryError::Validation(format!("endpoint permission {id} is deleted")));
        }
        if !endpoint.is_deleted() {
            if let Some(holder) = self.live.get(endpoint.key()) {
                if *holder != id {
                    return Err(duplicate_key(endpoint.key()));
                }
            }
        }

        let old_key = stored.key().clone();
        if self.live.get(&old_key) == Some(&id) {
            self.live.remove(&old_key);
        }

        let next = endpoint.next_version();
        if !next.is_deleted() {
            self.live.insert(next.key().clone(), id);
        }
        self.rows.insert(id, next.clone());
        Ok(next)
    }
}

/// In-memory registry store.
///
/// Rows and the live-key index share one lock; `apply_sync` stages the whole
/// plan on a copy and swaps it in only when every write succeeded.
#[derive(Debug, Default)]
pub struct InMemoryEndpointPermissionStore {
    state: RwLock<State>,
}

impl InMemoryEndpointPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RegistryError> {
        self.state
            .read()
            .map_err(|_| RegistryError::Store("in-memory registry state poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RegistryError> {
        self.state
            .write()
            .map_err(|_| RegistryError::Store("in-memory registry state poisoned".to_string()))
    }
}

impl EndpointPermissionStore for InMemoryEndpointPermissionStore {
    fn create(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        self.write()?.insert_new(endpoint)
    }

    fn update(&self, endpoint: EndpointPermission) -> Result<EndpointPermission, RegistryError> {
        self.write()?.replace(endpoint)
    }

    fn soft_delete(&self, id: EndpointPermissionId, now: DateTime<Utc>) -> Result<EndpointPermission, RegistryError> {
        let mut state = self.write()?;
        let deleted = state.rows.get(&id).ok_or(RegistryError::NotFound)?.soft_delete(now)?;
        state.replace(deleted)
    }

    fn get(&self, id: EndpointPermissionId) -> Result<Option<EndpointPermission>, RegistryError> {
        Ok(self.read()?.rows.get(&id).cloned())
    }

    fn find_by_key(
        &self,
        service_name: &str,
        http_path: &str,
        http_method: HttpMethod,
    ) -> Result<Option<EndpointPermission>, RegistryError> {
        let key = EndpointKey {
            service_name: service_name.to_string(),
            http_path: http_path.to_string(),
            http_method,
        };
        let state = self.read()?;
        Ok(state.live.get(&key).and_then(|id| state.rows.get(id)).cloned())
    }

    fn list_by_service(&self, service_name: &str) -> Result<Vec<EndpointPermission>, RegistryError> {
        let state = self.read()?;
        let mut rows: Vec<EndpointPermission> = state
            .rows
            .values()
            .filter(|ep| !ep.is_deleted() && ep.service_name() == service_name)
            .cloned()
            .collect();
        rows.sort_by(listing_order);
        Ok(rows)
    }

    fn apply_sync(&self, plan: &SyncPlan) -> Result<(), RegistryError> {
        let mut state = self.write()?;
        let mut staged = state.clone();

        for endpoint in &plan.creates {
            staged.insert_new(endpoint.clone())?;
        }
        for endpoint in &plan.updates {
            staged.replace(endpoint.clone())?;
        }

        *state = staged;
        debug!(
            service = %plan.service_name,
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            "sync plan applied"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl EndpointPermissionQuery for InMemoryEndpointPermissionStore {
    async fn search(
        &self,
        filter: EndpointFilter,
        pagination: Pagination,
    ) -> Result<EndpointQueryResult, RegistryError> {
        let state = self.read()?;
        let mut matched: Vec<&EndpointPermission> = state.rows.values().filter(|ep| filter.matches(ep)).collect();
        matched.sort_by(|a, b| listing_order(a, b));

        let total = matched.len() as u64;
        let items: Vec<EndpointPermission> = matched
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;

        Ok(EndpointQueryResult {
            items,
            total,
            pagination,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::Permission;
    use warden_registry::{AccessRule, EndpointPermissionRecord};

    fn key(path: &str, method: HttpMethod) -> EndpointKey {
        EndpointKey::new("user-service", path, method).unwrap()
    }

    fn new_endpoint(path: &str, method: HttpMethod) -> EndpointPermission {
        EndpointPermission::create(key(path, method), AccessRule::default(), Utc::now()).unwrap()
    }

    #[test]
    fn create_rejects_duplicate_live_key() {
        let store = InMemoryEndpointPermissionStore::new();
        store.create(new_endpoint("/users", HttpMethod::Get)).unwrap();

        let err = store.create(new_endpoint("/users", HttpMethod::Get)).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
        assert!(store.create(new_endpoint("/users", HttpMethod::Post)).is_ok());
    }

    #[test]
    fn key_is_reusable_after_soft_delete() {
        let store = InMemoryEndpointPermissionStore::new();
        let first = store.create(new_endpoint("/users", HttpMethod::Get)).unwrap();
        let deleted = store.soft_delete(first.id_typed(), Utc::now()).unwrap();
        assert!(deleted.is_deleted());

        assert!(!store.exists_by_key("user-service", "/users", HttpMethod::Get).unwrap());
        let second = store.create(new_endpoint("/users", HttpMethod::Get)).unwrap();
        let found = store.find_by_key("user-service", "/users", HttpMethod::Get).unwrap().unwrap();
        assert_eq!(found.id_typed(), second.id_typed());
        assert!(store.get(first.id_typed()).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn update_checks_version_and_increments() {
        let store = InMemoryEndpointPermissionStore::new();
        let created = store.create(new_endpoint("/users", HttpMethod::Get)).unwrap();

        let public = created.make_public(Utc::now()).unwrap();
        let saved = store.update(public.clone()).unwrap();
        assert_eq!(saved.version(), 1);

        let err = store.update(public).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[test]
    fn update_rejects_key_held_by_another_entry() {
        let store = InMemoryEndpointPermissionStore::new();
        let a = store.create(new_endpoint("/a", HttpMethod::Get)).unwrap();
        store.create(new_endpoint("/b", HttpMethod::Get)).unwrap();

        let moved = EndpointPermission::from_record(EndpointPermissionRecord {
            id: a.id_typed(),
            key: key("/b", HttpMethod::Get),
            rule: a.rule().clone(),
            version: a.version(),
            created_at: a.created_at(),
            updated_at: a.updated_at(),
            deleted_at: None,
        });
        assert!(matches!(store.update(moved), Err(RegistryError::Conflict(_))));
    }

    #[test]
    fn missing_and_deleted_rows() {
        let store = InMemoryEndpointPermissionStore::new();
        assert_eq!(
            store.soft_delete(EndpointPermissionId::new(), Utc::now()).unwrap_err(),
            RegistryError::NotFound
        );
        assert_eq!(store.update(new_endpoint("/x", HttpMethod::Get)).unwrap_err(), RegistryError::NotFound);

        let created = store.create(new_endpoint("/x", HttpMethod::Get)).unwrap();
        store.soft_delete(created.id_typed(), Utc::now()).unwrap();
        assert!(matches!(
            store.soft_delete(created.id_typed(), Utc::now()),
            Err(RegistryError::Validation(_))
        ));
    }

    #[test]
    fn apply_sync_is_all_or_nothing() {
        let store = InMemoryEndpointPermissionStore::new();
        let existing = store.create(new_endpoint("/taken", HttpMethod::Get)).unwrap();

        let plan = SyncPlan {
            service_name: "user-service".to_string(),
            creates: vec![new_endpoint("/fresh", HttpMethod::Get), new_endpoint("/taken", HttpMethod::Get)],
            updates: vec![],
            result: Default::default(),
        };
        assert!(store.apply_sync(&plan).is_err());
        assert_eq!(store.list_by_service("user-service").unwrap(), vec![existing]);
    }

    #[test]
    fn list_by_service_is_sorted_and_scoped() {
        let store = InMemoryEndpointPermissionStore::new();
        store.create(new_endpoint("/b", HttpMethod::Get)).unwrap();
        store.create(new_endpoint("/a", HttpMethod::Post)).unwrap();
        store
            .create(
                EndpointPermission::create(
                    EndpointKey::new("billing", "/a", HttpMethod::Get).unwrap(),
                    AccessRule::default(),
                    Utc::now(),
                )
                .unwrap(),
            )
            .unwrap();

        let paths: Vec<String> = store
            .list_by_service("user-service")
            .unwrap()
            .iter()
            .map(|ep| ep.http_path().to_string())
            .collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }

    #[test]
    fn methods_on_one_path_list_by_name() {
        let store = InMemoryEndpointPermissionStore::new();
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Delete] {
            store.create(new_endpoint("/users", method)).unwrap();
        }
        let methods: Vec<HttpMethod> = store
            .list_by_service("user-service")
            .unwrap()
            .iter()
            .map(EndpointPermission::http_method)
            .collect();
        assert_eq!(methods, vec![HttpMethod::Delete, HttpMethod::Get, HttpMethod::Post]);
    }

    #[test]
    fn find_by_key_misses_other_services_and_methods() {
        let store = InMemoryEndpointPermissionStore::new();
        let created = store.create(new_endpoint("/users", HttpMethod::Get)).unwrap();

        let found = store.find_by_key("user-service", "/users", HttpMethod::Get).unwrap().unwrap();
        assert_eq!(found.id_typed(), created.id_typed());
        assert!(store.find_by_key("billing", "/users", HttpMethod::Get).unwrap().is_none());
        assert!(store.find_by_key("user-service", "/users", HttpMethod::Put).unwrap().is_none());
        assert!(store.find_by_key("user-service", "users", HttpMethod::Get).unwrap().is_none());
    }

    #[test]
    fn search_paginates() {
        let store = InMemoryEndpointPermissionStore::new();
        for i in 0..5 {
            let rule = AccessRule {
                required_permissions: [Permission::parse("user:read").unwrap()].into_iter().collect(),
                ..AccessRule::default()
            };
            let ep = EndpointPermission::create(key(&format!("/r{i}"), HttpMethod::Get), rule, Utc::now()).unwrap();
            store.create(ep).unwrap();
        }

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let page = rt
            .block_on(store.search(EndpointFilter::service("user-service"), Pagination::new(Some(2), Some(2))))
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].http_path(), "/r2");
        assert!(page.has_more);

        let last = rt
            .block_on(store.search(EndpointFilter::default(), Pagination::new(Some(2), Some(4))))
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
    }
}
