//! Endpoint permission registry persistence and sync coordination.

pub mod coordinator;
pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use coordinator::SyncCoordinator;
pub use in_memory::InMemoryEndpointPermissionStore;
pub use postgres::PostgresEndpointPermissionStore;
pub use query::{EndpointFilter, EndpointPermissionQuery, EndpointQueryResult, Pagination};
pub use store::EndpointPermissionStore;

use warden_core::{DomainError, ErrorClass};

/// Registry error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("endpoint permission not found")]
    NotFound,

    /// Duplicate natural key or stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("registry store error: {0}")]
    Store(String),
}

impl RegistryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Store(_))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RegistryError::Validation(_) => ErrorClass::Validation,
            RegistryError::NotFound => ErrorClass::NotFound,
            RegistryError::Conflict(_) => ErrorClass::Conflict,
            RegistryError::Store(_) => ErrorClass::Unavailable,
        }
    }
}

impl From<DomainError> for RegistryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvariantViolation(msg) | DomainError::InvalidId(msg) => {
                RegistryError::Validation(msg)
            }
            DomainError::NotFound => RegistryError::NotFound,
            DomainError::Conflict(msg) => RegistryError::Conflict(msg),
        }
    }
}
