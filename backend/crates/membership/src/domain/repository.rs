//! Repository Traits
//!
//! The keyed-store contract. Implementations own their locking; every
//! method is atomic at the key.

use chrono::{DateTime, Utc};
use kernel::id::IdentityId;

use crate::domain::entity::{
    identity::Identity, remember_entry::RememberEntry, session_entry::SessionEntry,
};
use crate::domain::value_object::email::Email;
use crate::error::MembershipResult;

/// Identity repository trait
#[trait_variant::make(IdentityRepository: Send)]
pub trait LocalIdentityRepository {
    /// Insert; `DuplicateIdentity` when the email or id already exists
    async fn insert_identity(&self, identity: &Identity) -> MembershipResult<()>;

    async fn find_identity(&self, id: IdentityId) -> MembershipResult<Option<Identity>>;

    async fn find_identity_by_email(&self, email: &Email) -> MembershipResult<Option<Identity>>;

    /// Overwrite credential, approval and activity; `NotFound` when absent
    async fn update_identity(&self, identity: &Identity) -> MembershipResult<()>;

    /// Returns whether a row was deleted
    async fn delete_identity(&self, id: IdentityId) -> MembershipResult<bool>;

    /// Refresh `last_activity` only
    async fn touch_identity(&self, id: IdentityId, at: DateTime<Utc>) -> MembershipResult<()>;

    /// Ordered by id, strictly after `after`
    async fn list_identities(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>>;

    /// Identities with `last_activity >= since`
    async fn count_active_since(&self, since: DateTime<Utc>) -> MembershipResult<u64>;

    /// Identities with `last_activity >= since`, ordered by id, strictly after `after`
    async fn list_active_since(
        &self,
        since: DateTime<Utc>,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn find_session(&self, id: &str) -> MembershipResult<Option<SessionEntry>>;

    /// Insert; `DuplicateKey` when the id exists
    async fn insert_session(&self, entry: &SessionEntry) -> MembershipResult<()>;

    /// Store `entry` only if the stored version still equals `expected_version`.
    /// Returns false on a version mismatch or a missing entry.
    async fn update_session_if_version(
        &self,
        entry: &SessionEntry,
        expected_version: u64,
    ) -> MembershipResult<bool>;

    /// Refresh `last_activity` without touching data or version
    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> MembershipResult<()>;

    async fn delete_session(&self, id: &str) -> MembershipResult<()>;

    /// Delete sessions whose `last_activity` is before `idle_before`
    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> MembershipResult<u64>;
}

/// Remember-me repository trait
#[trait_variant::make(RememberRepository: Send)]
pub trait LocalRememberRepository {
    async fn find_remember(&self, identity_id: IdentityId)
    -> MembershipResult<Option<RememberEntry>>;

    /// Insert or overwrite the entry for `entry.identity_id`
    async fn upsert_remember(&self, entry: &RememberEntry) -> MembershipResult<()>;

    /// Compare-and-swap on `(identity_id, expected_token)`.
    /// Returns false when the stored token differs or the entry is gone.
    async fn replace_remember_token(
        &self,
        expected_token: &str,
        entry: &RememberEntry,
    ) -> MembershipResult<bool>;

    /// Returns whether an entry was deleted
    async fn delete_remember(&self, identity_id: IdentityId) -> MembershipResult<bool>;

    /// Delete entries with `expires_at <= before`
    async fn purge_expired_remember(&self, before: DateTime<Utc>) -> MembershipResult<u64>;
}
