//! Token revocation (blacklist) storage.
//!
//! ## Components
//!
//! - `RevocationStore`: backing store contract (membership set, expiry index, records)
//! - `InMemoryRevocationStore`: single-process store for tests and local runs
//! - `RedisRevocationStore`: sorted-set backed store (feature `redis`)
//! - `RevocationCache`: validating facade used by token verification and cleanup

pub mod cache;
pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use cache::RevocationCache;
pub use in_memory::InMemoryRevocationStore;
#[cfg(feature = "redis")]
pub use redis::RedisRevocationStore;
pub use store::RevocationStore;

use warden_core::{DomainError, ErrorClass};

/// Revocation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevocationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing store unreachable or returned an error.
    #[error("revocation store error: {0}")]
    Store(String),
}

impl RevocationError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// True when retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RevocationError::Store(_))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RevocationError::InvalidArgument(_) => ErrorClass::Validation,
            RevocationError::Store(_) => ErrorClass::Unavailable,
        }
    }
}

impl From<DomainError> for RevocationError {
    fn from(err: DomainError) -> Self {
        RevocationError::InvalidArgument(err.to_string())
    }
}
