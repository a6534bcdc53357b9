use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::revocation::{RevocationCache, RevocationError, RevocationStore};

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Expired jtis found by the scan.
    pub found: usize,
    /// Entries actually removed. Lower than `found` when a concurrent pass won
    /// or a jti was re-revoked with a later expiry after the scan.
    pub removed: usize,
}

/// Purges revocation entries whose token has expired.
///
/// Idempotent: overlapping runs only find less to remove. A token revoked
/// while a pass is in flight is not part of that pass's snapshot.
#[derive(Debug, Clone)]
pub struct CleanupJob<S> {
    cache: RevocationCache<S>,
    batch_size: usize,
}

impl<S: RevocationStore> CleanupJob<S> {
    pub fn new(cache: RevocationCache<S>, batch_size: usize) -> Self {
        Self { cache, batch_size }
    }

    pub fn cache(&self) -> &RevocationCache<S> {
        &self.cache
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One pass: scan up to `batch_size` entries expired at `now`, remove them.
    ///
    /// Performs no write when nothing has expired.
    #[instrument(skip(self), fields(batch_size = self.batch_size), err)]
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<CleanupReport, RevocationError> {
        let limit = i64::try_from(self.batch_size).unwrap_or(i64::MAX);
        let expired = self.cache.find_expired_jtis(now.timestamp(), limit)?;
        if expired.is_empty() {
            return Ok(CleanupReport::default());
        }

        let removed = self.cache.remove_expired(&expired, now.timestamp())?;
        info!(found = expired.len(), removed, "expired revocations removed");
        Ok(CleanupReport {
            found: expired.len(),
            removed,
        })
    }

    pub fn run_now(&self) -> Result<CleanupReport, RevocationError> {
        self.run_once(Utc::now())
    }
}
