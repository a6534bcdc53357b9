//! Endpoint manifests produced by a service's route scanner.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_auth::{Permission, Role};
use warden_core::DomainResult;

use crate::endpoint::{AccessRule, EndpointKey, HttpMethod};

/// One route discovered by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedEndpoint {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub required_permissions: BTreeSet<Permission>,
    #[serde(default)]
    pub required_roles: BTreeSet<Role>,
}

impl ScannedEndpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            description: String::new(),
            is_public: false,
            required_permissions: BTreeSet::new(),
            required_roles: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.required_permissions = permissions.into_iter().collect();
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles = roles.into_iter().collect();
        self
    }

    pub fn key(&self, service_name: &str) -> DomainResult<EndpointKey> {
        EndpointKey::new(service_name, self.path.clone(), self.method)
    }

    pub fn rule(&self) -> AccessRule {
        AccessRule {
            description: self.description.clone(),
            is_public: self.is_public,
            required_permissions: self.required_permissions.clone(),
            required_roles: self.required_roles.clone(),
        }
    }
}

/// Full scanner output for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceManifest {
    pub service_name: String,
    #[serde(default)]
    pub endpoints: Vec<ScannedEndpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_from_scanner_json() {
        let json = r#"{
            "serviceName": "user-service",
            "endpoints": [
                {"path": "/api/v1/users", "method": "GET", "requiredPermissions": ["user:read"]},
                {"path": "/health", "method": "GET", "isPublic": true}
            ]
        }"#;
        let manifest: ServiceManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.service_name, "user-service");
        assert_eq!(manifest.endpoints.len(), 2);
        assert!(manifest.endpoints[1].is_public);
        assert!(manifest.endpoints[1].required_permissions.is_empty());
        assert!(
            manifest.endpoints[0]
                .required_permissions
                .contains(&Permission::parse("user:read").unwrap())
        );
    }

    #[test]
    fn malformed_permission_fails_manifest_parsing() {
        let json = r#"{"serviceName": "s", "endpoints": [
            {"path": "/a", "method": "GET", "requiredPermissions": ["USER"]}
        ]}"#;
        assert!(serde_json::from_str::<ServiceManifest>(json).is_err());
    }

    #[test]
    fn key_validates_path() {
        assert!(ScannedEndpoint::new("no-slash", HttpMethod::Get).key("svc").is_err());
        assert!(ScannedEndpoint::new("/ok", HttpMethod::Get).key("").is_err());
    }
}
