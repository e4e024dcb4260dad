//! In-Memory Store
//!
//! All three repositories over `parking_lot` locks. Used by tests and for
//! development; nothing survives a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::IdentityId;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::domain::entity::{
    identity::Identity, remember_entry::RememberEntry, session_entry::SessionEntry,
};
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::domain::value_object::email::Email;
use crate::error::{MembershipError, MembershipResult};

#[derive(Default)]
struct Identities {
    by_id: BTreeMap<IdentityId, Identity>,
    by_email: HashMap<String, IdentityId>,
}

/// In-memory membership store
#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<Identities>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    remember: RwLock<HashMap<IdentityId, RememberEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Stored copy of a session entry
    pub fn session(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.read().get(id).cloned()
    }

    /// Stored copy of a remember-me entry
    pub fn remember(&self, identity_id: IdentityId) -> Option<RememberEntry> {
        self.remember.read().get(&identity_id).cloned()
    }

    /// Periodically drop sessions idle longer than `session_ttl` and expired
    /// remember-me entries. Stops once the store is dropped.
    pub fn spawn_expiry_sweep(self: &Arc<Self>, every: Duration, session_ttl: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let ttl = TimeDelta::from_std(session_ttl).unwrap_or(TimeDelta::MAX);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    tracing::debug!("Memory store dropped; expiry sweep stopped");
                    return;
                };
                let (sessions, remembered) = store.sweep(Utc::now(), ttl);
                if sessions > 0 || remembered > 0 {
                    tracing::debug!(sessions, remembered, "Expiry sweep");
                }
            }
        })
    }

    fn sweep(&self, now: DateTime<Utc>, ttl: TimeDelta) -> (u64, u64) {
        let idle_before = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        (
            self.purge_sessions_before(idle_before),
            self.purge_remember_until(now),
        )
    }

    fn purge_sessions_before(&self, idle_before: DateTime<Utc>) -> u64 {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_activity >= idle_before);
        (before - sessions.len()) as u64
    }

    fn purge_remember_until(&self, before: DateTime<Utc>) -> u64 {
        let mut remember = self.remember.write();
        let count = remember.len();
        remember.retain(|_, entry| entry.expires_at > before);
        (count - remember.len()) as u64
    }
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

impl IdentityRepository for MemoryStore {
    async fn insert_identity(&self, identity: &Identity) -> MembershipResult<()> {
        let mut identities = self.identities.write();
        if identities.by_id.contains_key(&identity.id)
            || identities.by_email.contains_key(identity.email.as_str())
        {
            return Err(MembershipError::DuplicateIdentity);
        }
        identities
            .by_email
            .insert(identity.email.as_str().to_string(), identity.id);
        identities.by_id.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn find_identity(&self, id: IdentityId) -> MembershipResult<Option<Identity>> {
        Ok(self.identities.read().by_id.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &Email) -> MembershipResult<Option<Identity>> {
        let identities = self.identities.read();
        Ok(identities
            .by_email
            .get(email.as_str())
            .and_then(|id| identities.by_id.get(id))
            .cloned())
    }

    async fn update_identity(&self, identity: &Identity) -> MembershipResult<()> {
        let mut identities = self.identities.write();
        let stored = identities
            .by_id
            .get_mut(&identity.id)
            .ok_or(MembershipError::NotFound("identity"))?;
        stored.credential = identity.credential.clone();
        stored.previous_credential = identity.previous_credential.clone();
        stored.approved = identity.approved;
        stored.last_activity = identity.last_activity;
        stored.updated_at = identity.updated_at;
        Ok(())
    }

    async fn delete_identity(&self, id: IdentityId) -> MembershipResult<bool> {
        let mut identities = self.identities.write();
        match identities.by_id.remove(&id) {
            Some(identity) => {
                identities.by_email.remove(identity.email.as_str());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_identity(&self, id: IdentityId, at: DateTime<Utc>) -> MembershipResult<()> {
        if let Some(identity) = self.identities.write().by_id.get_mut(&id) {
            identity.last_activity = Some(at);
        }
        Ok(())
    }

    async fn list_identities(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        let identities = self.identities.read();
        Ok(page(&identities.by_id, after)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> MembershipResult<u64> {
        let identities = self.identities.read();
        let count = identities
            .by_id
            .values()
            .filter(|identity| identity.last_activity.is_some_and(|at| at >= since))
            .count();
        Ok(count as u64)
    }

    async fn list_active_since(
        &self,
        since: DateTime<Utc>,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        let identities = self.identities.read();
        Ok(page(&identities.by_id, after)
            .filter(|identity| identity.last_activity.is_some_and(|at| at >= since))
            .take(limit)
            .cloned()
            .collect())
    }
}

fn page(
    by_id: &BTreeMap<IdentityId, Identity>,
    after: Option<IdentityId>,
) -> impl Iterator<Item = &Identity> {
    by_id
        .iter()
        .filter(move |(id, _)| after.is_none_or(|after| **id > after))
        .map(|(_, identity)| identity)
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for MemoryStore {
    async fn find_session(&self, id: &str) -> MembershipResult<Option<SessionEntry>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn insert_session(&self, entry: &SessionEntry) -> MembershipResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&entry.id) {
            return Err(MembershipError::DuplicateKey("sessions"));
        }
        sessions.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn update_session_if_version(
        &self,
        entry: &SessionEntry,
        expected_version: u64,
    ) -> MembershipResult<bool> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&entry.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = entry.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> MembershipResult<()> {
        if let Some(entry) = self.sessions.write().get_mut(id) {
            entry.last_activity = at;
        }
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> MembershipResult<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> MembershipResult<u64> {
        Ok(self.purge_sessions_before(idle_before))
    }
}

// ============================================================================
// Remember Repository Implementation
// ============================================================================

impl RememberRepository for MemoryStore {
    async fn find_remember(
        &self,
        identity_id: IdentityId,
    ) -> MembershipResult<Option<RememberEntry>> {
        Ok(self.remember.read().get(&identity_id).cloned())
    }

    async fn upsert_remember(&self, entry: &RememberEntry) -> MembershipResult<()> {
        self.remember
            .write()
            .insert(entry.identity_id, entry.clone());
        Ok(())
    }

    async fn replace_remember_token(
        &self,
        expected_token: &str,
        entry: &RememberEntry,
    ) -> MembershipResult<bool> {
        let mut remember = self.remember.write();
        match remember.get_mut(&entry.identity_id) {
            Some(stored) if stored.token == expected_token => {
                *stored = entry.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_remember(&self, identity_id: IdentityId) -> MembershipResult<bool> {
        Ok(self.remember.write().remove(&identity_id).is_some())
    }

    async fn purge_expired_remember(&self, before: DateTime<Utc>) -> MembershipResult<u64> {
        Ok(self.purge_remember_until(before))
    }
}
