//! Session Login Stamp
//!
//! Stored in the session under the configured login key when a user logs
//! in without "remember me". Sliding: refreshed on every successful
//! resolution.

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::IdentityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStamp {
    identity_id: Uuid,
    at: DateTime<Utc>,
}

impl LoginStamp {
    pub fn new(identity_id: IdentityId, at: DateTime<Utc>) -> Self {
        Self {
            identity_id: identity_id.into_uuid(),
            at,
        }
    }

    pub fn identity_id(&self) -> IdentityId {
        IdentityId::from_uuid(self.identity_id)
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// `now - at <= threshold`
    pub fn is_fresh(&self, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.at) <= threshold
    }
}
