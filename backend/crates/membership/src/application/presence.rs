//! Online-Presence Tracker

use std::sync::Arc;

use kernel::id::IdentityId;

use crate::application::clock::Clock;
use crate::application::config::MembershipConfig;
use crate::application::store_call::bounded;
use crate::domain::entity::identity::Identity;
use crate::domain::presence::online_since;
use crate::domain::repository::IdentityRepository;
use crate::error::MembershipResult;

/// Largest page handed out by the listing queries
pub const MAX_PAGE_SIZE: usize = 500;

pub struct PresenceTracker<R>
where
    R: IdentityRepository + Send + Sync + 'static,
{
    repo: Arc<R>,
    config: Arc<MembershipConfig>,
    clock: Arc<dyn Clock>,
}

impl<R> PresenceTracker<R>
where
    R: IdentityRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<MembershipConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Identities active within the online threshold
    pub async fn count_online(&self) -> MembershipResult<u64> {
        let since = online_since(self.config.online_threshold_delta(), self.clock.now());
        bounded(
            self.config.store_timeout,
            "count_active_since",
            self.repo.count_active_since(since),
        )
        .await
    }

    /// One page of online identities, ordered by id; `after` is the last id seen
    pub async fn list_online(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        let since = online_since(self.config.online_threshold_delta(), self.clock.now());
        bounded(
            self.config.store_timeout,
            "list_active_since",
            self.repo.list_active_since(since, after, limit.min(MAX_PAGE_SIZE)),
        )
        .await
    }

    /// One page of all identities, ordered by id
    pub async fn list_identities(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        bounded(
            self.config.store_timeout,
            "list_identities",
            self.repo.list_identities(after, limit.min(MAX_PAGE_SIZE)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::domain::entity::identity::Credential;
    use crate::domain::value_object::email::Email;
    use crate::infra::memory::MemoryStore;
    use chrono::{TimeDelta, Utc};

    async fn seed(repo: &MemoryStore, email: &str, active: Option<chrono::DateTime<Utc>>) -> Identity {
        let now = Utc::now();
        let credential = Credential {
            hashed_secret: vec![0; 32],
            salt: vec![1; 32],
            algorithm: "sha256".to_string(),
            created_at: now,
        };
        let mut identity = Identity::new(Email::new(email).unwrap(), credential, true, now);
        identity.last_activity = active;
        repo.insert_identity(&identity).await.unwrap();
        identity
    }

    #[tokio::test]
    async fn test_online_boundary() {
        let repo = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let tracker = PresenceTracker::new(repo.clone(), Arc::new(MembershipConfig::default()), clock);

        seed(&repo, "edge@example.com", Some(now - TimeDelta::seconds(900))).await;
        seed(&repo, "past@example.com", Some(now - TimeDelta::seconds(901))).await;
        seed(&repo, "never@example.com", None).await;

        assert_eq!(tracker.count_online().await.unwrap(), 1);
        let online = tracker.list_online(None, 10).await.unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].email.as_str(), "edge@example.com");
    }

    #[tokio::test]
    async fn test_keyset_pages_cover_everyone_once() {
        let repo = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = PresenceTracker::new(repo.clone(), Arc::new(MembershipConfig::default()), clock);

        for i in 0..7 {
            seed(&repo, &format!("user{i}@example.com"), None).await;
        }

        let mut seen = Vec::new();
        let mut after = None;
        loop {
            let page = tracker.list_identities(after, 3).await.unwrap();
            if page.is_empty() {
                break;
            }
            after = page.last().map(|identity| identity.id);
            seen.extend(page.into_iter().map(|identity| identity.id));
        }

        assert_eq!(seen.len(), 7);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }
}
