//! Administrative search over the registry.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use warden_registry::{EndpointPermission, HttpMethod};

use super::RegistryError;

/// Pagination parameters for registry searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Search criteria; `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFilter {
    pub service_name: Option<String>,
    pub http_method: Option<HttpMethod>,
    pub is_public: Option<bool>,
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl EndpointFilter {
    pub fn service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, endpoint: &EndpointPermission) -> bool {
        (self.include_deleted || !endpoint.is_deleted())
            && self.service_name.as_deref().is_none_or(|s| endpoint.service_name() == s)
            && self.http_method.is_none_or(|m| endpoint.http_method() == m)
            && self.is_public.is_none_or(|p| endpoint.is_public() == p)
            && self
                .path_prefix
                .as_deref()
                .is_none_or(|prefix| endpoint.http_path().starts_with(prefix))
    }
}

/// `ORDER BY` clause matching [`listing_order`]. Byte-wise collation so text
/// columns compare the way Rust strings do.
pub(crate) const LISTING_ORDER_SQL: &str =
    r#"service_name COLLATE "C", http_path COLLATE "C", http_method COLLATE "C", created_at"#;

/// Listing order shared by every backend: service, path, method name, then
/// creation time. Methods compare by their upper-case name.
pub(crate) fn listing_order(a: &EndpointPermission, b: &EndpointPermission) -> Ordering {
    a.service_name()
        .cmp(b.service_name())
        .then_with(|| a.http_path().cmp(b.http_path()))
        .then_with(|| a.http_method().as_str().cmp(b.http_method().as_str()))
        .then_with(|| a.created_at().cmp(&b.created_at()))
}

/// Paginated search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointQueryResult {
    pub items: Vec<EndpointPermission>,
    /// Matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Async query interface for administrative listing.
///
/// Results follow [`listing_order`].
#[async_trait::async_trait]
pub trait EndpointPermissionQuery: Send + Sync {
    async fn search(
        &self,
        filter: EndpointFilter,
        pagination: Pagination,
    ) -> Result<EndpointQueryResult, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_registry::{AccessRule, EndpointKey};

    #[test]
    fn listing_order_compares_method_names() {
        let get = endpoint("svc", "/a", HttpMethod::Get, false);
        let delete = endpoint("svc", "/a", HttpMethod::Delete, false);
        let later_path = endpoint("svc", "/b", HttpMethod::Delete, false);

        assert_eq!(listing_order(&delete, &get), Ordering::Less);
        assert_eq!(listing_order(&get, &later_path), Ordering::Less);
        assert!(LISTING_ORDER_SQL.contains(r#"http_method COLLATE "C""#));
    }

    fn endpoint(service: &str, path: &str, method: HttpMethod, public: bool) -> EndpointPermission {
        let rule = AccessRule {
            is_public: public,
            ..AccessRule::default()
        };
        EndpointPermission::create(EndpointKey::new(service, path, method).unwrap(), rule, Utc::now()).unwrap()
    }

    #[test]
    fn pagination_is_capped() {
        assert_eq!(Pagination::new(Some(10_000), None).limit, Pagination::MAX_LIMIT);
        assert_eq!(Pagination::new(None, Some(7)), Pagination { limit: 50, offset: 7 });
    }

    #[test]
    fn filter_combines_criteria() {
        let ep = endpoint("users", "/api/v1/users", HttpMethod::Get, false);

        assert!(EndpointFilter::default().matches(&ep));
        assert!(EndpointFilter::service("users").matches(&ep));
        assert!(!EndpointFilter::service("billing").matches(&ep));

        let filter = EndpointFilter {
            http_method: Some(HttpMethod::Get),
            is_public: Some(false),
            path_prefix: Some("/api/v1".into()),
            ..EndpointFilter::service("users")
        };
        assert!(filter.matches(&ep));
        assert!(!EndpointFilter { is_public: Some(true), ..filter.clone() }.matches(&ep));
        assert!(!EndpointFilter { path_prefix: Some("/admin".into()), ..filter }.matches(&ep));
    }

    #[test]
    fn deleted_rows_need_opt_in() {
        let ep = endpoint("users", "/a", HttpMethod::Get, true).soft_delete(Utc::now()).unwrap();
        assert!(!EndpointFilter::default().matches(&ep));
        assert!(EndpointFilter { include_deleted: true, ..EndpointFilter::default() }.matches(&ep));
    }
}
