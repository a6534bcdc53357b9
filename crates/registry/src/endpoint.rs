//! Endpoint permission aggregate.
//!
//! Maps `(service, HTTP path, HTTP method)` to the permissions and roles a
//! caller needs. Every mutator returns a new snapshot; the stored value is
//! never shared mutably.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_auth::{Permission, Role};
use warden_core::{AggregateRoot, DomainError, DomainResult, ValueObject};

/// Longest accepted description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Synthetic identifier of an endpoint registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointPermissionId(Uuid);

impl EndpointPermissionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EndpointPermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EndpointPermissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// HTTP method of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl core::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HttpMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(DomainError::validation(format!("unsupported http method '{other}'"))),
        }
    }
}

/// Natural key of a registration. Unique across non-deleted entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "EndpointKeyRecord")]
pub struct EndpointKey {
    pub service_name: String,
    pub http_path: String,
    pub http_method: HttpMethod,
}

/// Unvalidated wire shape; deserialization goes through [`EndpointKey::new`].
#[derive(Deserialize)]
struct EndpointKeyRecord {
    service_name: String,
    http_path: String,
    http_method: HttpMethod,
}

impl TryFrom<EndpointKeyRecord> for EndpointKey {
    type Error = DomainError;

    fn try_from(r: EndpointKeyRecord) -> Result<Self, Self::Error> {
        Self::new(r.service_name, r.http_path, r.http_method)
    }
}

impl EndpointKey {
    pub fn new(
        service_name: impl Into<String>,
        http_path: impl Into<String>,
        http_method: HttpMethod,
    ) -> DomainResult<Self> {
        let service_name = service_name.into();
        let http_path = http_path.into();

        validate_service_name(&service_name)?;
        validate_path(&http_path)?;

        Ok(Self {
            service_name,
            http_path,
            http_method,
        })
    }
}

impl core::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {} {}", self.service_name, self.http_method, self.http_path)
    }
}

pub fn validate_service_name(service_name: &str) -> DomainResult<()> {
    if service_name.trim().is_empty() {
        return Err(DomainError::validation("service name must not be blank"));
    }
    Ok(())
}

fn validate_path(path: &str) -> DomainResult<()> {
    if !path.starts_with('/') {
        return Err(DomainError::validation(format!("http path '{path}' must start with '/'")));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(DomainError::validation(format!("http path '{path}' must not contain whitespace")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Access rule
// ─────────────────────────────────────────────────────────────────────────────

/// What an endpoint demands of its callers.
///
/// When `is_public` is set, the permission and role sets are informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AccessRuleRecord")]
pub struct AccessRule {
    pub description: String,
    pub is_public: bool,
    pub required_permissions: BTreeSet<Permission>,
    pub required_roles: BTreeSet<Role>,
}

#[derive(Deserialize)]
struct AccessRuleRecord {
    description: String,
    is_public: bool,
    required_permissions: BTreeSet<Permission>,
    required_roles: BTreeSet<Role>,
}

impl TryFrom<AccessRuleRecord> for AccessRule {
    type Error = DomainError;

    fn try_from(r: AccessRuleRecord) -> Result<Self, Self::Error> {
        let rule = Self {
            description: r.description,
            is_public: r.is_public,
            required_permissions: r.required_permissions,
            required_roles: r.required_roles,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl ValueObject for AccessRule {}

impl AccessRule {
    pub fn validate(&self) -> DomainResult<()> {
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.required_roles.iter().any(Role::is_blank) {
            return Err(DomainError::validation("required roles must not be blank"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Endpoint permission registration.
///
/// # Invariants
/// - The natural key is validated on creation and never changes.
/// - A soft-deleted registration rejects every further mutation.
/// - `updated_at` never moves backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EndpointPermissionRecord")]
pub struct EndpointPermission {
    id: EndpointPermissionId,
    key: EndpointKey,
    rule: AccessRule,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

/// Persisted shape, used by stores when loading rows.
///
/// Key and rule validate themselves when deserialized; the timestamps are
/// checked by the `TryFrom` conversion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointPermissionRecord {
    pub id: EndpointPermissionId,
    pub key: EndpointKey,
    pub rule: AccessRule,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<EndpointPermissionRecord> for EndpointPermission {
    type Error = DomainError;

    fn try_from(record: EndpointPermissionRecord) -> Result<Self, Self::Error> {
        if record.updated_at < record.created_at {
            return Err(DomainError::validation("updated_at precedes created_at"));
        }
        if record.deleted_at.is_some_and(|at| at < record.created_at) {
            return Err(DomainError::validation("deleted_at precedes created_at"));
        }
        Ok(Self::from_record(record))
    }
}

impl EndpointPermission {
    /// Register a new endpoint at version 0.
    pub fn create(key: EndpointKey, rule: AccessRule, now: DateTime<Utc>) -> DomainResult<Self> {
        rule.validate()?;
        Ok(Self {
            id: EndpointPermissionId::new(),
            key,
            rule,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn from_record(record: EndpointPermissionRecord) -> Self {
        Self {
            id: record.id,
            key: record.key,
            rule: record.rule,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
        }
    }

    pub fn id_typed(&self) -> EndpointPermissionId {
        self.id
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    pub fn service_name(&self) -> &str {
        &self.key.service_name
    }

    pub fn http_path(&self) -> &str {
        &self.key.http_path
    }

    pub fn http_method(&self) -> HttpMethod {
        self.key.http_method
    }

    pub fn rule(&self) -> &AccessRule {
        &self.rule
    }

    pub fn description(&self) -> &str {
        &self.rule.description
    }

    pub fn is_public(&self) -> bool {
        self.rule.is_public
    }

    pub fn required_permissions(&self) -> &BTreeSet<Permission> {
        &self.rule.required_permissions
    }

    pub fn required_roles(&self) -> &BTreeSet<Role> {
        &self.rule.required_roles
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators (each returns a new snapshot)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn change_description(&self, description: impl Into<String>, now: DateTime<Utc>) -> DomainResult<Self> {
        let rule = AccessRule {
            description: description.into(),
            ..self.rule.clone()
        };
        self.with_rule(rule, now)
    }

    pub fn make_public(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        let rule = AccessRule {
            is_public: true,
            ..self.rule.clone()
        };
        self.with_rule(rule, now)
    }

    pub fn make_protected(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        let rule = AccessRule {
            is_public: false,
            ..self.rule.clone()
        };
        self.with_rule(rule, now)
    }

    pub fn replace_permissions(
        &self,
        permissions: impl IntoIterator<Item = Permission>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let rule = AccessRule {
            required_permissions: permissions.into_iter().collect(),
            ..self.rule.clone()
        };
        self.with_rule(rule, now)
    }

    pub fn replace_roles(&self, roles: impl IntoIterator<Item = Role>, now: DateTime<Utc>) -> DomainResult<Self> {
        let rule = AccessRule {
            required_roles: roles.into_iter().collect(),
            ..self.rule.clone()
        };
        self.with_rule(rule, now)
    }

    /// Replace the whole access rule at once.
    pub fn with_rule(&self, rule: AccessRule, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_not_deleted()?;
        rule.validate()?;
        Ok(Self {
            rule,
            updated_at: self.advance(now),
            ..self.clone()
        })
    }

    pub fn soft_delete(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_not_deleted()?;
        let at = self.advance(now);
        Ok(Self {
            updated_at: at,
            deleted_at: Some(at),
            ..self.clone()
        })
    }

    /// Snapshot as persisted after a successful write: version incremented.
    ///
    /// Stores call this exactly once per accepted update.
    pub fn next_version(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }

    fn ensure_not_deleted(&self) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::invariant(format!(
                "endpoint permission {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    fn advance(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.updated_at)
    }
}

impl AggregateRoot for EndpointPermission {
    type Id = EndpointPermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
