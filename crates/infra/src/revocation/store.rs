use std::sync::Arc;

use warden_auth::{BlacklistedToken, Jti};

use super::RevocationError;

/// Backing store for revoked tokens.
///
/// Implementations keep three views in step: a membership set of jtis, an
/// index of the same jtis ordered by expiry, and one record per jti.
/// Arguments arrive already validated by [`super::RevocationCache`].
pub trait RevocationStore: Send + Sync {
    /// Write record, membership and index entry. Overwrites an existing jti.
    fn put(&self, token: &BlacklistedToken) -> Result<(), RevocationError>;

    /// Membership test.
    fn contains(&self, jti: &Jti) -> Result<bool, RevocationError>;

    /// Stored record, if any.
    fn get(&self, jti: &Jti) -> Result<Option<BlacklistedToken>, RevocationError>;

    /// Up to `limit` jtis with expiry `<= max_epoch_secs`, ascending by expiry.
    fn range_by_expiry(&self, max_epoch_secs: i64, limit: usize) -> Result<Vec<Jti>, RevocationError>;

    /// Remove every view of each jti as one unit.
    ///
    /// Returns how many were present. Absent jtis are skipped without error.
    fn remove_batch(&self, jtis: &[Jti]) -> Result<usize, RevocationError>;

    /// Like [`Self::remove_batch`], but only for entries whose stored expiry is
    /// still `<= max_epoch_secs`.
    ///
    /// A jti re-revoked with a later expiry after it was scanned is kept. The
    /// expiry check and the removal happen as one unit.
    fn remove_expired(&self, jtis: &[Jti], max_epoch_secs: i64) -> Result<usize, RevocationError>;
}

impl<S: RevocationStore + ?Sized> RevocationStore for Arc<S> {
    fn put(&self, token: &BlacklistedToken) -> Result<(), RevocationError> {
        (**self).put(token)
    }

    fn contains(&self, jti: &Jti) -> Result<bool, RevocationError> {
        (**self).contains(jti)
    }

    fn get(&self, jti: &Jti) -> Result<Option<BlacklistedToken>, RevocationError> {
        (**self).get(jti)
    }

    fn range_by_expiry(&self, max_epoch_secs: i64, limit: usize) -> Result<Vec<Jti>, RevocationError> {
        (**self).range_by_expiry(max_epoch_secs, limit)
    }

    fn remove_batch(&self, jtis: &[Jti]) -> Result<usize, RevocationError> {
        (**self).remove_batch(jtis)
    }

    fn remove_expired(&self, jtis: &[Jti], max_epoch_secs: i64) -> Result<usize, RevocationError> {
        (**self).remove_expired(jtis, max_epoch_secs)
    }
}
