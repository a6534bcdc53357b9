use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::{DomainError, ValueObject};

/// Wildcard segment matching any concrete resource or action.
pub const WILDCARD: &str = "*";

/// Separator between the resource and action segments.
pub const SEPARATOR: char = ':';

/// Maximum length of a single permission segment.
pub const MAX_SEGMENT_LEN: usize = 30;

/// Permission identifier of the form `"{resource}:{action}"`.
///
/// The string is validated and split exactly once, when the permission first
/// enters the system. Matching afterwards works on the pre-computed segment
/// boundary and never re-parses.
///
/// Each segment is either `*` or lowercase `[a-z][a-z0-9_-]*` of at most
/// [`MAX_SEGMENT_LEN`] characters. `*:*` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    raw: Cow<'static, str>,
    sep: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionParseError {
    #[error("permission must not be empty")]
    Empty,

    #[error("permission '{0}' must have the form 'resource:action'")]
    MissingSeparator(String),

    #[error("permission '{permission}' has an invalid {position} segment '{segment}'")]
    InvalidSegment {
        permission: String,
        position: &'static str,
        segment: String,
    },

    #[error("permission '{permission}' has a {position} segment longer than 30 characters")]
    SegmentTooLong {
        permission: String,
        position: &'static str,
    },
}

impl From<PermissionParseError> for DomainError {
    fn from(err: PermissionParseError) -> Self {
        DomainError::validation(err.to_string())
    }
}

impl Permission {
    /// Parse and validate a permission string.
    pub fn parse(value: &str) -> Result<Self, PermissionParseError> {
        Self::from_cow(Cow::Owned(value.to_string()))
    }

    /// Parse a `'static` permission without allocating (catalog constants).
    pub fn from_static(value: &'static str) -> Result<Self, PermissionParseError> {
        Self::from_cow(Cow::Borrowed(value))
    }

    /// Build a permission from already-separated segments.
    pub fn from_parts(resource: &str, action: &str) -> Result<Self, PermissionParseError> {
        Self::parse(&format!("{resource}{SEPARATOR}{action}"))
    }

    /// The global wildcard `*:*`.
    pub fn all() -> Self {
        Self {
            raw: Cow::Borrowed("*:*"),
            sep: 1,
        }
    }

    fn from_cow(raw: Cow<'static, str>) -> Result<Self, PermissionParseError> {
        if raw.is_empty() {
            return Err(PermissionParseError::Empty);
        }

        let sep = raw
            .find(SEPARATOR)
            .ok_or_else(|| PermissionParseError::MissingSeparator(raw.to_string()))?;

        validate_segment(&raw, &raw[..sep], "resource")?;
        validate_segment(&raw, &raw[sep + 1..], "action")?;

        Ok(Self { raw, sep })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn resource(&self) -> &str {
        &self.raw[..self.sep]
    }

    pub fn action(&self) -> &str {
        &self.raw[self.sep + 1..]
    }

    /// `*:*`
    pub fn is_global_wildcard(&self) -> bool {
        self.resource() == WILDCARD && self.action() == WILDCARD
    }

    /// True when either segment is `*`.
    pub fn is_wildcard(&self) -> bool {
        self.resource() == WILDCARD || self.action() == WILDCARD
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    ///
    /// Any one of these is sufficient:
    /// - exact equality
    /// - `self` is `*:*`
    /// - `self` is `{resource}:*` and the resources match
    /// - `self` is `*:{action}` and the actions match
    pub fn grants(&self, required: &Permission) -> bool {
        if self == required || self.is_global_wildcard() {
            return true;
        }
        if self.action() == WILDCARD && self.resource() == required.resource() {
            return true;
        }
        self.resource() == WILDCARD && self.action() == required.action()
    }
}

fn validate_segment(
    permission: &str,
    segment: &str,
    position: &'static str,
) -> Result<(), PermissionParseError> {
    if segment == WILDCARD {
        return Ok(());
    }

    if segment.len() > MAX_SEGMENT_LEN {
        return Err(PermissionParseError::SegmentTooLong {
            permission: permission.to_string(),
            position,
        });
    }

    let mut chars = segment.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_tail =
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(PermissionParseError::InvalidSegment {
            permission: permission.to_string(),
            position,
            segment: segment.to_string(),
        })
    }
}

impl ValueObject for Permission {}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl core::str::FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_cow(Cow::Owned(value))
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.raw.into_owned()
    }
}

/// Unordered set of held permission grants.
///
/// Owned by the request's [`crate::ActorContext`] and read-only for the
/// lifetime of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Parse every entry, failing on the first malformed one.
    pub fn parse_all<I, S>(values: I) -> Result<Self, PermissionParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|v| Permission::parse(v.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::collections::hash_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_resource_and_action() {
        let p = Permission::parse("user:read").unwrap();
        assert_eq!(p.resource(), "user");
        assert_eq!(p.action(), "read");
        assert!(!p.is_wildcard());
    }

    #[test]
    fn parse_accepts_wildcard_segments() {
        assert!(Permission::parse("*:*").unwrap().is_global_wildcard());
        assert!(Permission::parse("user:*").unwrap().is_wildcard());
        assert!(Permission::parse("*:read").unwrap().is_wildcard());
        assert_eq!(Permission::all(), Permission::parse("*:*").unwrap());
    }

    #[test]
    fn parse_accepts_digits_dashes_and_underscores_after_first_char() {
        assert!(Permission::parse("endpoint_permission:bulk-sync2").is_ok());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(Permission::parse(""), Err(PermissionParseError::Empty));
        assert!(matches!(
            Permission::parse("userread"),
            Err(PermissionParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            Permission::parse("User:read"),
            Err(PermissionParseError::InvalidSegment { position: "resource", .. })
        ));
        assert!(matches!(
            Permission::parse("user:"),
            Err(PermissionParseError::InvalidSegment { position: "action", .. })
        ));
        assert!(matches!(
            Permission::parse("1user:read"),
            Err(PermissionParseError::InvalidSegment { .. })
        ));
        assert!(matches!(
            Permission::parse("user:read:extra"),
            Err(PermissionParseError::InvalidSegment { position: "action", .. })
        ));
        assert!(matches!(
            Permission::parse("user:**"),
            Err(PermissionParseError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn parse_enforces_segment_length() {
        let ok = format!("{}:read", "a".repeat(MAX_SEGMENT_LEN));
        let too_long = format!("{}:read", "a".repeat(MAX_SEGMENT_LEN + 1));
        assert!(Permission::parse(&ok).is_ok());
        assert!(matches!(
            Permission::parse(&too_long),
            Err(PermissionParseError::SegmentTooLong { position: "resource", .. })
        ));
    }

    #[test]
    fn grants_follows_wildcard_rules() {
        let read = Permission::parse("user:read").unwrap();
        let role_read = Permission::parse("role:read").unwrap();

        assert!(read.grants(&read));
        assert!(Permission::all().grants(&read));
        assert!(Permission::parse("user:*").unwrap().grants(&read));
        assert!(!Permission::parse("user:*").unwrap().grants(&role_read));
        assert!(Permission::parse("*:read").unwrap().grants(&role_read));
        assert!(!Permission::parse("*:write").unwrap().grants(&role_read));
        assert!(!read.grants(&Permission::all()));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let p: Permission = serde_json::from_str("\"tenant:update\"").unwrap();
        assert_eq!(p.action(), "update");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"tenant:update\"");
        assert!(serde_json::from_str::<Permission>("\"TENANT\"").is_err());
    }

    #[test]
    fn parse_all_collects_into_set() {
        let set = PermissionSet::parse_all(["user:read", "user:read", "role:*"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(PermissionSet::parse_all(["user:read", "nope"]).is_err());
    }
}
