//! Infrastructure layer: revocation storage, cleanup scheduling, registry
//! persistence and configuration.

pub mod cleanup;
pub mod config;
pub mod registry;
pub mod revocation;


pub use cleanup::{CleanupHandle, CleanupJob, CleanupReport, CleanupScheduler, CleanupStats};
pub use config::{CleanupConfig, ConfigError, OutagePolicy, RevocationConfig, RevocationKeys, WorkerConfig};
pub use registry::{
    EndpointFilter, EndpointPermissionQuery, EndpointPermissionStore, EndpointQueryResult,
    InMemoryEndpointPermissionStore, Pagination, PostgresEndpointPermissionStore, RegistryError,
    SyncCoordinator,
};
#[cfg(feature = "redis")]
pub use revocation::RedisRevocationStore;
pub use revocation::{InMemoryRevocationStore, RevocationCache, RevocationError, RevocationStore};
