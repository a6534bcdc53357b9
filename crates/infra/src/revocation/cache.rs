//! Revocation cache facade.
//!
//! Validates arguments before any store access and applies the configured
//! outage policy for `is_revoked`.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use warden_auth::{BlacklistedToken, Jti, RevocationReason};

use crate::config::{OutagePolicy, RevocationConfig};

use super::{RevocationError, RevocationStore};

/// Revoked-token lookups and maintenance over a [`RevocationStore`].
///
/// Safe to share between request threads and the cleanup job: every call is
/// one store operation, and the store provides atomicity.
#[derive(Debug, Clone)]
pub struct RevocationCache<S> {
    store: S,
    outage_policy: OutagePolicy,
}

impl<S: RevocationStore> RevocationCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &RevocationConfig::default())
    }

    pub fn with_config(store: S, config: &RevocationConfig) -> Self {
        Self {
            store,
            outage_policy: config.outage_policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn outage_policy(&self) -> OutagePolicy {
        self.outage_policy
    }

    /// Record a revocation. Re-adding a jti overwrites its previous entry.
    #[instrument(skip(self, token), fields(jti = %token.jti(), reason = %token.reason()), err)]
    pub fn add(&self, token: &BlacklistedToken) -> Result<(), RevocationError> {
        self.store.put(token)?;
        info!(expires_at = token.expires_at(), "token revoked");
        Ok(())
    }

    /// Build and record a revocation stamped with the current time.
    pub fn revoke(
        &self,
        jti: &str,
        expires_at: i64,
        reason: RevocationReason,
    ) -> Result<BlacklistedToken, RevocationError> {
        self.revoke_at(jti, expires_at, reason, Utc::now())
    }

    pub fn revoke_at(
        &self,
        jti: &str,
        expires_at: i64,
        reason: RevocationReason,
        revoked_at: DateTime<Utc>,
    ) -> Result<BlacklistedToken, RevocationError> {
        let token = BlacklistedToken::new(Jti::new(jti)?, expires_at, reason, revoked_at)?;
        self.add(&token)?;
        Ok(token)
    }

    /// Membership test. Store failures are returned, never hidden.
    pub fn exists(&self, jti: &str) -> Result<bool, RevocationError> {
        let jti = Jti::new(jti)?;
        self.store.contains(&jti)
    }

    /// Membership test with the outage policy applied.
    ///
    /// Validation errors still fail; only store errors fall back to the policy.
    pub fn is_revoked(&self, jti: &str) -> Result<bool, RevocationError> {
        match self.exists(jti) {
            Err(err) if err.is_transient() => {
                let assumed = self.outage_policy == OutagePolicy::FailClosed;
                warn!(jti, error = %err, assumed_revoked = assumed, "revocation store unavailable");
                Ok(assumed)
            }
            other => other,
        }
    }

    /// Stored record of a revoked jti.
    pub fn record(&self, jti: &str) -> Result<Option<BlacklistedToken>, RevocationError> {
        let jti = Jti::new(jti)?;
        self.store.get(&jti)
    }

    /// Up to `limit` jtis whose expiry is `<= max_epoch_secs`, ascending by expiry.
    pub fn find_expired_jtis(&self, max_epoch_secs: i64, limit: i64) -> Result<Vec<Jti>, RevocationError> {
        if max_epoch_secs < 0 {
            return Err(RevocationError::invalid(format!(
                "max_epoch_secs must be >= 0 (got {max_epoch_secs})"
            )));
        }
        if limit <= 0 {
            return Err(RevocationError::invalid(format!("limit must be > 0 (got {limit})")));
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let expired = self.store.range_by_expiry(max_epoch_secs, limit)?;
        debug!(max_epoch_secs, found = expired.len(), "expired revocations scanned");
        Ok(expired)
    }

    /// Remove every listed jti in one batch. Returns how many were present.
    #[instrument(skip(self, jtis), fields(batch_size = jtis.len()), err)]
    pub fn remove_all(&self, jtis: &[Jti]) -> Result<usize, RevocationError> {
        if jtis.is_empty() {
            return Err(RevocationError::invalid("jti batch must not be empty"));
        }
        let removed = self.store.remove_batch(jtis)?;
        debug!(removed, "revocations purged");
        Ok(removed)
    }

    /// Remove the listed jtis whose stored expiry is still `<= max_epoch_secs`.
    ///
    /// Entries overwritten with a later expiry since the scan stay revoked.
    #[instrument(skip(self, jtis), fields(batch_size = jtis.len()), err)]
    pub fn remove_expired(&self, jtis: &[Jti], max_epoch_secs: i64) -> Result<usize, RevocationError> {
        if jtis.is_empty() {
            return Err(RevocationError::invalid("jti batch must not be empty"));
        }
        if max_epoch_secs < 0 {
            return Err(RevocationError::invalid(format!(
                "max_epoch_secs must be >= 0 (got {max_epoch_secs})"
            )));
        }
        let removed = self.store.remove_expired(jtis, max_epoch_secs)?;
        debug!(removed, max_epoch_secs, "expired revocations purged");
        Ok(removed)
    }
}
