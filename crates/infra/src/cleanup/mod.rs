//! Expired revocation cleanup.
//!
//! - `CleanupJob`: one bounded purge pass (find expired, then remove)
//! - `CleanupScheduler`: runs the job on a named background thread every interval
//! - `CleanupHandle`: shutdown and statistics for a running scheduler

pub mod job;
pub mod scheduler;

pub use job::{CleanupJob, CleanupReport};
pub use scheduler::{CleanupHandle, CleanupScheduler, CleanupStats};
