//! Remember-Me Entry Entity
//!
//! One outstanding entry per identity. The token rotates on every use.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::IdentityId;

#[derive(Clone, PartialEq, Eq)]
pub struct RememberEntry {
    pub identity_id: IdentityId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

impl RememberEntry {
    /// Expired when `expires_at + skew <= now`
    pub fn is_expired(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        now.signed_duration_since(self.expires_at) >= skew
    }

    /// Same identity and expiry, new token
    pub fn rotated(&self, token: String, now: DateTime<Utc>) -> Self {
        Self {
            identity_id: self.identity_id,
            token,
            expires_at: self.expires_at,
            issued_at: now,
        }
    }

    /// Whole seconds left until expiry (cookie Max-Age)
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at.signed_duration_since(now).num_seconds().max(0)
    }
}

impl fmt::Debug for RememberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RememberEntry")
            .field("identity_id", &self.identity_id)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
