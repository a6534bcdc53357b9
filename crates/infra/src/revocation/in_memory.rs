use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use warden_auth::{BlacklistedToken, Jti};

use super::{RevocationError, RevocationStore};

#[derive(Debug, Default)]
struct State {
    records: HashMap<Jti, BlacklistedToken>,
    /// `(expires_at, jti)`, so iteration is ascending by expiry.
    by_expiry: BTreeSet<(i64, Jti)>,
}

/// In-memory revocation store.
///
/// Record, membership and index share one lock, so a batch removal is never
/// observable half-applied. Membership is the key set of `records`.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    state: RwLock<State>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RevocationError> {
        self.state
            .read()
            .map_err(|_| RevocationError::store("in-memory revocation state poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RevocationError> {
        self.state
            .write()
            .map_err(|_| RevocationError::store("in-memory revocation state poisoned"))
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn put(&self, token: &BlacklistedToken) -> Result<(), RevocationError> {
        let mut state = self.write()?;
        if let Some(previous) = state.records.insert(token.jti().clone(), token.clone()) {
            state.by_expiry.remove(&(previous.expires_at(), previous.jti().clone()));
        }
        state.by_expiry.insert((token.expires_at(), token.jti().clone()));
        Ok(())
    }

    fn contains(&self, jti: &Jti) -> Result<bool, RevocationError> {
        Ok(self.read()?.records.contains_key(jti))
    }

    fn get(&self, jti: &Jti) -> Result<Option<BlacklistedToken>, RevocationError> {
        Ok(self.read()?.records.get(jti).cloned())
    }

    fn range_by_expiry(&self, max_epoch_secs: i64, limit: usize) -> Result<Vec<Jti>, RevocationError> {
        let state = self.read()?;
        Ok(state
            .by_expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= max_epoch_secs)
            .take(limit)
            .map(|(_, jti)| jti.clone())
            .collect())
    }

    fn remove_batch(&self, jtis: &[Jti]) -> Result<usize, RevocationError> {
        let mut state = self.write()?;
        let mut removed = 0;
        for jti in jtis {
            if let Some(record) = state.records.remove(jti) {
                state.by_expiry.remove(&(record.expires_at(), jti.clone()));
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn remove_expired(&self, jtis: &[Jti], max_epoch_secs: i64) -> Result<usize, RevocationError> {
        let mut state = self.write()?;
        let mut removed = 0;
        for jti in jtis {
            let expires_at = match state.records.get(jti) {
                Some(record) if record.expires_at() <= max_epoch_secs => record.expires_at(),
                _ => continue,
            };
            state.records.remove(jti);
            state.by_expiry.remove(&(expires_at, jti.clone()));
            removed += 1;
        }
        Ok(removed)
    }
}
