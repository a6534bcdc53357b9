//! Runtime configuration.
//!
//! Every setting has a default; `WorkerConfig::from_env` overrides them from
//! `WARDEN_*` environment variables.

use std::time::Duration;

use tracing::warn;

use warden_auth::Jti;

pub const DEFAULT_MEMBERS_KEY: &str = "blacklist:tokens";
pub const DEFAULT_EXPIRY_KEY: &str = "blacklist:expiry";
pub const DEFAULT_RECORD_PREFIX: &str = "blacklist_token:";
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

pub const ENV_REDIS_URL: &str = "WARDEN_REDIS_URL";
pub const ENV_DATABASE_URL: &str = "WARDEN_DATABASE_URL";
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "WARDEN_CLEANUP_INTERVAL_SECS";
pub const ENV_CLEANUP_BATCH_SIZE: &str = "WARDEN_CLEANUP_BATCH_SIZE";
pub const ENV_REVOCATION_FAIL_OPEN: &str = "WARDEN_REVOCATION_FAIL_OPEN";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: &'static str, reason: String },
}

/// Key layout of the revocation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationKeys {
    /// Set of revoked jtis.
    pub members: String,
    /// Sorted set of jtis scored by expiry (epoch seconds).
    pub expiry: String,
    /// Prefix of the per-jti record key.
    pub record_prefix: String,
}

impl Default for RevocationKeys {
    fn default() -> Self {
        Self {
            members: DEFAULT_MEMBERS_KEY.to_string(),
            expiry: DEFAULT_EXPIRY_KEY.to_string(),
            record_prefix: DEFAULT_RECORD_PREFIX.to_string(),
        }
    }
}

impl RevocationKeys {
    pub fn record(&self, jti: &Jti) -> String {
        format!("{}{}", self.record_prefix, jti.as_str())
    }
}

/// What `RevocationCache::is_revoked` answers when the store cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutagePolicy {
    /// Treat the token as revoked.
    #[default]
    FailClosed,
    /// Treat the token as not revoked.
    FailOpen,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationConfig {
    pub keys: RevocationKeys,
    pub outage_policy: OutagePolicy,
}

impl RevocationConfig {
    pub fn with_outage_policy(mut self, policy: OutagePolicy) -> Self {
        self.outage_policy = policy;
        self
    }

    pub fn with_keys(mut self, keys: RevocationKeys) -> Self {
        self.keys = keys;
        self
    }
}

/// Cleanup scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Pause between runs
    pub interval: Duration,
    /// Maximum jtis purged per run
    pub batch_size: usize,
    /// Thread name and log field
    pub name: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 1000,
            name: "revocation-cleanup".to_string(),
        }
    }
}

impl CleanupConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Settings of the cleanup worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub database_url: Option<String>,
    pub revocation: RevocationConfig,
    pub cleanup: CleanupConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = lookup(ENV_REDIS_URL).unwrap_or_else(|| {
            warn!("{ENV_REDIS_URL} not set; using {DEFAULT_REDIS_URL}");
            DEFAULT_REDIS_URL.to_string()
        });
        let database_url = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty());

        let mut cleanup = CleanupConfig::default();
        if let Some(raw) = lookup(ENV_CLEANUP_INTERVAL_SECS) {
            let secs: u64 = parse(ENV_CLEANUP_INTERVAL_SECS, &raw)?;
            if secs == 0 {
                return Err(invalid(ENV_CLEANUP_INTERVAL_SECS, "must be greater than 0"));
            }
            cleanup = cleanup.with_interval(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup(ENV_CLEANUP_BATCH_SIZE) {
            let size: usize = parse(ENV_CLEANUP_BATCH_SIZE, &raw)?;
            if size == 0 {
                return Err(invalid(ENV_CLEANUP_BATCH_SIZE, "must be greater than 0"));
            }
            cleanup = cleanup.with_batch_size(size);
        }

        let mut revocation = RevocationConfig::default();
        if let Some(raw) = lookup(ENV_REVOCATION_FAIL_OPEN) {
            if parse::<bool>(ENV_REVOCATION_FAIL_OPEN, &raw)? {
                revocation = revocation.with_outage_policy(OutagePolicy::FailOpen);
            }
        }

        Ok(Self {
            redis_url,
            database_url,
            revocation,
            cleanup,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| invalid(var, e.to_string()))
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.cleanup, CleanupConfig::default());
        assert_eq!(cfg.cleanup.batch_size, 1000);
        assert_eq!(cfg.cleanup.interval, Duration::from_secs(60));
        assert_eq!(cfg.revocation.outage_policy, OutagePolicy::FailClosed);
        assert_eq!(cfg.revocation.keys.members, "blacklist:tokens");
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = WorkerConfig::from_lookup(lookup(&[
            (ENV_REDIS_URL, "redis://cache:6379"),
            (ENV_DATABASE_URL, "postgres://db/warden"),
            (ENV_CLEANUP_INTERVAL_SECS, "15"),
            (ENV_CLEANUP_BATCH_SIZE, "250"),
            (ENV_REVOCATION_FAIL_OPEN, "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.redis_url, "redis://cache:6379");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://db/warden"));
        assert_eq!(cfg.cleanup.interval, Duration::from_secs(15));
        assert_eq!(cfg.cleanup.batch_size, 250);
        assert_eq!(cfg.revocation.outage_policy, OutagePolicy::FailOpen);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = WorkerConfig::from_lookup(lookup(&[(ENV_CLEANUP_BATCH_SIZE, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { var: ENV_CLEANUP_BATCH_SIZE, .. }));

        let err = WorkerConfig::from_lookup(lookup(&[(ENV_CLEANUP_INTERVAL_SECS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { var: ENV_CLEANUP_INTERVAL_SECS, .. }));

        assert!(WorkerConfig::from_lookup(lookup(&[(ENV_REVOCATION_FAIL_OPEN, "maybe")])).is_err());
    }

    #[test]
    fn record_key_uses_prefix() {
        let keys = RevocationKeys::default();
        assert_eq!(keys.record(&Jti::new("abc").unwrap()), "blacklist_token:abc");
    }
}
