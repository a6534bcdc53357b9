//! Redis-backed revocation store.
//!
//! ## Layout
//!
//! - **Membership**: set `blacklist:tokens` of jtis (`SADD`/`SISMEMBER`/`SREM`)
//! - **Expiry index**: sorted set `blacklist:expiry`, score = expiry epoch seconds
//! - **Records**: string `blacklist_token:{jti}` holding the JSON record
//!
//! Writes touching more than one key run in a `MULTI`/`EXEC` pipeline. The
//! expiry-guarded purge runs as a Lua script so the score check and the
//! removal cannot interleave with a concurrent `put`.

use std::sync::Arc;

use tracing::{error, instrument};

use warden_auth::{BlacklistedToken, Jti};

use crate::config::RevocationKeys;

use super::{RevocationError, RevocationStore};

#[derive(Debug, Clone)]
pub struct RedisRevocationStore {
    client: Arc<redis::Client>,
    keys: RevocationKeys,
}

impl RedisRevocationStore {
    /// Create a store for the given Redis URL (e.g. "redis://localhost:6379").
    pub fn new(redis_url: impl AsRef<str>, keys: RevocationKeys) -> Result<Self, RevocationError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RevocationError::store(format!("redis client: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            keys,
        })
    }

    pub fn keys(&self) -> &RevocationKeys {
        &self.keys
    }

    fn connection(&self) -> Result<redis::Connection, RevocationError> {
        self.client.get_connection().map_err(|e| {
            error!(error = %e, "redis connection failed");
            RevocationError::store(format!("redis connection: {e}"))
        })
    }
}

/// KEYS: membership set, expiry index, then one record key per jti.
/// ARGV: cutoff, then the jtis in the same order as their record keys.
const REMOVE_EXPIRED_SCRIPT: &str = r#"
local cutoff = tonumber(ARGV[1])
local removed = 0
for i = 2, #ARGV do
  local jti = ARGV[i]
  local score = redis.call('ZSCORE', KEYS[2], jti)
  if score and tonumber(score) <= cutoff then
    redis.call('ZREM', KEYS[2], jti)
    redis.call('DEL', KEYS[i + 1])
    removed = removed + redis.call('SREM', KEYS[1], jti)
  end
end
return removed
"#;

fn command_error(command: &str, err: redis::RedisError) -> RevocationError {
    error!(command, error = %err, "redis command failed");
    RevocationError::store(format!("{command} failed: {err}"))
}

impl RevocationStore for RedisRevocationStore {
    #[instrument(skip(self, token), fields(jti = %token.jti(), expires_at = token.expires_at()), err)]
    fn put(&self, token: &BlacklistedToken) -> Result<(), RevocationError> {
        let payload = serde_json::to_string(token)
            .map_err(|e| RevocationError::store(format!("record serialization: {e}")))?;
        let jti = token.jti().as_str();
        let mut conn = self.connection()?;

        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(self.keys.record(token.jti()))
            .arg(&payload)
            .ignore()
            .cmd("SADD")
            .arg(&self.keys.members)
            .arg(jti)
            .ignore()
            .cmd("ZADD")
            .arg(&self.keys.expiry)
            .arg(token.expires_at())
            .arg(jti)
            .ignore()
            .query::<()>(&mut conn)
            .map_err(|e| command_error("MULTI put", e))
    }

    fn contains(&self, jti: &Jti) -> Result<bool, RevocationError> {
        let mut conn = self.connection()?;
        redis::cmd("SISMEMBER")
            .arg(&self.keys.members)
            .arg(jti.as_str())
            .query::<bool>(&mut conn)
            .map_err(|e| command_error("SISMEMBER", e))
    }

    fn get(&self, jti: &Jti) -> Result<Option<BlacklistedToken>, RevocationError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.keys.record(jti))
            .query(&mut conn)
            .map_err(|e| command_error("GET", e))?;

        raw.map(|payload| {
            serde_json::from_str(&payload)
                .map_err(|e| RevocationError::store(format!("corrupt record for {jti}: {e}")))
        })
        .transpose()
    }

    #[instrument(skip(self), err)]
    fn range_by_expiry(&self, max_epoch_secs: i64, limit: usize) -> Result<Vec<Jti>, RevocationError> {
        let mut conn = self.connection()?;
        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.keys.expiry)
            .arg("-inf")
            .arg(max_epoch_secs)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query(&mut conn)
            .map_err(|e| command_error("ZRANGEBYSCORE", e))?;

        // Members were validated on the way in; skip anything foreign.
        Ok(members.into_iter().filter_map(|m| Jti::new(m).ok()).collect())
    }

    #[instrument(skip(self, jtis), fields(batch_size = jtis.len()), err)]
    fn remove_batch(&self, jtis: &[Jti]) -> Result<usize, RevocationError> {
        if jtis.is_empty() {
            return Ok(0);
        }
        let members: Vec<&str> = jtis.iter().map(Jti::as_str).collect();
        let records: Vec<String> = jtis.iter().map(|j| self.keys.record(j)).collect();
        let mut conn = self.connection()?;

        let (removed,): (usize,) = redis::pipe()
            .atomic()
            .cmd("SREM")
            .arg(&self.keys.members)
            .arg(&members)
            .cmd("ZREM")
            .arg(&self.keys.expiry)
            .arg(&members)
            .ignore()
            .cmd("DEL")
            .arg(&records)
            .ignore()
            .query(&mut conn)
            .map_err(|e| command_error("MULTI remove", e))?;

        Ok(removed)
    }

    #[instrument(skip(self, jtis), fields(batch_size = jtis.len()), err)]
    fn remove_expired(&self, jtis: &[Jti], max_epoch_secs: i64) -> Result<usize, RevocationError> {
        if jtis.is_empty() {
            return Ok(0);
        }
        let script = redis::Script::new(REMOVE_EXPIRED_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(&self.keys.members).key(&self.keys.expiry).arg(max_epoch_secs);
        for jti in jtis {
            invocation.key(self.keys.record(jti)).arg(jti.as_str());
        }
        let mut conn = self.connection()?;
        invocation
            .invoke::<usize>(&mut conn)
            .map_err(|e| command_error("EVALSHA remove_expired", e))
    }
}
