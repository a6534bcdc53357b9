//! Endpoint permission registry domain.
//!
//! Pure types and planning logic; persistence lives in `warden-infra`.

pub mod endpoint;
pub mod guard;
pub mod manifest;
pub mod sync;

pub use endpoint::{
    AccessRule, EndpointKey, EndpointPermission, EndpointPermissionId, EndpointPermissionRecord,
    HttpMethod, MAX_DESCRIPTION_LEN,
};
pub use guard::authorize_endpoint;
pub use manifest::{ScannedEndpoint, ServiceManifest};
pub use sync::{SyncPlan, SyncResult, plan_sync};
