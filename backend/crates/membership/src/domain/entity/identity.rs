//! Identity Entity
//!
//! The authenticated principal and its salted credential.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use kernel::id::IdentityId;

use crate::domain::presence;
use crate::domain::value_object::email::Email;
use crate::domain::value_object::profile::Profile;

/// Salted secret digest
///
/// `hashed_secret = H(secret ++ salt)` where `H` is named by `algorithm`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub hashed_secret: Vec<u8>,
    pub salt: Vec<u8>,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("hashed_secret", &"[HASH]")
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Identity entity
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: IdentityId,
    /// Unique, lower-cased
    pub email: Email,
    pub credential: Credential,
    /// Kept for audit/rollback only; never used to authenticate
    pub previous_credential: Option<Credential>,
    /// Unapproved identities cannot log in
    pub approved: bool,
    pub profile: Profile,
    /// Calendar day of registration
    pub join_day: NaiveDate,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: Email, credential: Credential, approved: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: IdentityId::new(),
            email,
            credential,
            previous_credential: None,
            approved,
            profile: Profile::default(),
            join_day: now.date_naive(),
            last_activity: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Swap in a new credential, keeping the current one as previous
    pub fn replace_credential(&mut self, credential: Credential, now: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.credential, credential);
        self.previous_credential = Some(previous);
        self.updated_at = now;
    }

    pub fn replace_profile(&mut self, profile: Profile, now: DateTime<Utc>) {
        self.profile = profile;
        self.updated_at = now;
    }

    pub fn approve(&mut self, now: DateTime<Utc>) {
        self.approved = true;
        self.updated_at = now;
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    pub fn is_online(&self, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
        self.last_activity
            .is_some_and(|at| presence::is_online(at, threshold, now))
    }
}
