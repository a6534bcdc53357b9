//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a permission
/// grant `user:read` is the same grant wherever it appears, while an endpoint
/// registration is an entity identified by its id.
///
/// To "modify" a value object, build a new one. Shared snapshots can then be
/// read from any number of threads without copying.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Segment(String);
///
/// impl ValueObject for Segment {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
