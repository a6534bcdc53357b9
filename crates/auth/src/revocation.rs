//! Revocation (blacklist) domain types.
//!
//! A revoked token is tracked by its `jti` until the token's own expiry. After
//! that instant the token fails expiry verification anyway, so the entry may be
//! purged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult};

/// Unique token identifier used as the revocation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jti(String);

impl Jti {
    /// Rejects blank identifiers.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("jti must not be blank"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Jti {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Jti {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Jti> for String {
    fn from(value: Jti) -> Self {
        value.0
    }
}

/// Why a token was invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationReason {
    Logout,
    PasswordChange,
    SecurityBreach,
    AdminRevoke,
}

impl core::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RevocationReason::Logout => "LOGOUT",
            RevocationReason::PasswordChange => "PASSWORD_CHANGE",
            RevocationReason::SecurityBreach => "SECURITY_BREACH",
            RevocationReason::AdminRevoke => "ADMIN_REVOKE",
        };
        f.write_str(s)
    }
}

/// A revocation entry.
///
/// # Invariants
/// - `expires_at >= 0` (epoch seconds of the original token's expiry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlacklistedTokenRecord")]
pub struct BlacklistedToken {
    jti: Jti,
    reason: RevocationReason,
    revoked_at: DateTime<Utc>,
    expires_at: i64,
}

/// Unvalidated wire shape; deserialization goes through [`BlacklistedToken::new`].
#[derive(Deserialize)]
struct BlacklistedTokenRecord {
    jti: Jti,
    reason: RevocationReason,
    revoked_at: DateTime<Utc>,
    expires_at: i64,
}

impl TryFrom<BlacklistedTokenRecord> for BlacklistedToken {
    type Error = DomainError;

    fn try_from(r: BlacklistedTokenRecord) -> Result<Self, Self::Error> {
        Self::new(r.jti, r.expires_at, r.reason, r.revoked_at)
    }
}

impl BlacklistedToken {
    pub fn new(
        jti: Jti,
        expires_at: i64,
        reason: RevocationReason,
        revoked_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if expires_at < 0 {
            return Err(DomainError::validation(format!(
                "expires_at must be >= 0 (got {expires_at})"
            )));
        }
        Ok(Self {
            jti,
            reason,
            revoked_at,
            expires_at,
        })
    }

    pub fn jti(&self) -> &Jti {
        &self.jti
    }

    pub fn reason(&self) -> RevocationReason {
        self.reason
    }

    pub fn revoked_at(&self) -> DateTime<Utc> {
        self.revoked_at
    }

    /// Epoch seconds after which the entry may be purged.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn is_purgeable_at(&self, now_epoch_secs: i64) -> bool {
        now_epoch_secs >= self.expires_at
    }
}
