//! Session Store Adapter
//!
//! Maps the opaque session cookie to a [`SessionEntry`]. A usable session is
//! always handed back: a missing, idle or mis-bound entry is replaced by a
//! fresh one that is persisted on its first mutation.
//!
//! Writes are conditional on the entry's `version`. On conflict the entry is
//! reloaded and the mutation re-applied, up to [`MAX_UPDATE_ATTEMPTS`] times.

use std::sync::Arc;

use platform::client::ClientBinding;
use platform::crypto::random_url_token;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::clock::Clock;
use crate::application::config::MembershipConfig;
use crate::application::store_call::bounded;
use crate::domain::entity::session_entry::SessionEntry;
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::cookie_directive::{CookieDirective, CookieKind};
use crate::error::{MembershipError, MembershipResult};

/// Random bytes behind a session id
pub const SESSION_ID_BYTES: usize = 32;

/// Conditional update attempts before `ConcurrentUpdate`
pub const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Longest cookie value looked up in the store
const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    FoundValid,
    /// Remote address or user agent changed; old entry deleted
    FoundInvalidBinding,
    /// No cookie, store miss or idle entry
    NotFound,
}

#[derive(Debug)]
pub struct SessionLoad {
    pub session: Session,
    pub outcome: LoadOutcome,
}

/// Request-scoped handle on a session entry
#[derive(Debug, Clone)]
pub struct Session {
    entry: SessionEntry,
    persisted: bool,
    cookie: Option<CookieDirective>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn entry(&self) -> &SessionEntry {
        &self.entry
    }

    /// False until the first mutation of a synthesized entry
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.entry.data.get(name)
    }

    /// Typed read; a value of the wrong shape is an error, absence is `None`
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> MembershipResult<Option<T>> {
        self.entry
            .data
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(MembershipError::from)
    }

    /// Look at a flash value without consuming it
    pub fn peek_flash(&self, name: &str) -> Option<&serde_json::Value> {
        self.entry.flash_data.get(name)
    }

    /// Cookie change produced by creation or destruction, if any
    pub fn take_cookie_directive(&mut self) -> Option<CookieDirective> {
        self.cookie.take()
    }
}

/// Session store adapter
pub struct SessionStore<R>
where
    R: SessionRepository + Send + Sync + 'static,
{
    repo: Arc<R>,
    config: Arc<MembershipConfig>,
    clock: Arc<dyn Clock>,
}

impl<R> SessionStore<R>
where
    R: SessionRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<MembershipConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Unsaved session with a new id
    pub fn fresh(&self, binding: &ClientBinding) -> MembershipResult<Session> {
        let id = random_url_token(SESSION_ID_BYTES)?;
        Ok(Session {
            entry: SessionEntry::new(id, binding, self.clock.now()),
            persisted: false,
            cookie: None,
        })
    }

    fn synthesize(&self, binding: &ClientBinding, outcome: LoadOutcome) -> MembershipResult<SessionLoad> {
        Ok(SessionLoad {
            session: self.fresh(binding)?,
            outcome,
        })
    }

    /// Resolve the session cookie
    pub async fn load(
        &self,
        cookie: Option<&str>,
        binding: &ClientBinding,
    ) -> MembershipResult<SessionLoad> {
        let timeout = self.config.store_timeout;
        let now = self.clock.now();

        let Some(id) = cookie.filter(|id| is_well_formed(id)) else {
            return self.synthesize(binding, LoadOutcome::NotFound);
        };

        let Some(mut entry) = bounded(timeout, "find_session", self.repo.find_session(id)).await?
        else {
            return self.synthesize(binding, LoadOutcome::NotFound);
        };

        if entry.is_idle(self.config.session_ttl_delta(), now) {
            if let Err(e) = bounded(timeout, "delete_session", self.repo.delete_session(id)).await {
                e.log();
            }
            tracing::debug!("Idle session discarded");
            return self.synthesize(binding, LoadOutcome::NotFound);
        }

        if !entry.binding_matches(
            binding,
            self.config.match_remote_addr,
            self.config.match_user_agent,
        ) {
            bounded(timeout, "delete_session", self.repo.delete_session(id)).await?;
            tracing::warn!(
                stored_addr = %entry.remote_addr,
                presented_addr = %binding.remote_addr,
                "Session binding mismatch; entry discarded"
            );
            return self.synthesize(binding, LoadOutcome::FoundInvalidBinding);
        }

        bounded(timeout, "touch_session", self.repo.touch_session(id, now)).await?;
        entry.last_activity = now;

        Ok(SessionLoad {
            session: Session {
                entry,
                persisted: true,
                cookie: None,
            },
            outcome: LoadOutcome::FoundValid,
        })
    }

    pub async fn set<V: Serialize>(
        &self,
        session: &mut Session,
        name: &str,
        value: V,
    ) -> MembershipResult<()> {
        let value = serde_json::to_value(value)?;
        let name = name.to_string();
        self.mutate(session, move |entry| {
            entry.data.insert(name.clone(), value.clone());
        })
        .await
    }

    /// Remove a data value; returns what was stored
    pub async fn delete(
        &self,
        session: &mut Session,
        name: &str,
    ) -> MembershipResult<Option<serde_json::Value>> {
        if !session.entry.data.contains_key(name) {
            return Ok(None);
        }
        self.mutate(session, |entry| entry.data.remove(name)).await
    }

    /// Clear all data, and flash data too when `include_flash`
    pub async fn delete_all(&self, session: &mut Session, include_flash: bool) -> MembershipResult<()> {
        self.mutate(session, |entry| {
            entry.data.clear();
            if include_flash {
                entry.flash_data.clear();
            }
        })
        .await
    }

    pub async fn set_flash<V: Serialize>(
        &self,
        session: &mut Session,
        name: &str,
        value: V,
    ) -> MembershipResult<()> {
        let value = serde_json::to_value(value)?;
        let name = name.to_string();
        self.mutate(session, move |entry| {
            entry.flash_data.insert(name.clone(), value.clone());
        })
        .await
    }

    /// Read-once: the value is removed in the same conditional write
    pub async fn take_flash(
        &self,
        session: &mut Session,
        name: &str,
    ) -> MembershipResult<Option<serde_json::Value>> {
        if !session.entry.flash_data.contains_key(name) {
            return Ok(None);
        }
        self.mutate(session, |entry| entry.flash_data.remove(name))
            .await
    }

    /// Delete the entry and clear the cookie.
    ///
    /// The handle is replaced by a fresh unsaved session.
    pub async fn destroy(&self, session: &mut Session) -> MembershipResult<()> {
        if session.persisted {
            bounded(
                self.config.store_timeout,
                "delete_session",
                self.repo.delete_session(session.id()),
            )
            .await?;
        }

        let binding = ClientBinding {
            remote_addr: session.entry.remote_addr.clone(),
            user_agent: session.entry.user_agent.clone(),
        };
        let mut fresh = self.fresh(&binding)?;
        fresh.cookie = Some(CookieDirective::Clear {
            kind: CookieKind::Session,
        });
        *session = fresh;

        tracing::debug!("Session destroyed");
        Ok(())
    }

    async fn mutate<T, F>(&self, session: &mut Session, mut apply: F) -> MembershipResult<T>
    where
        F: FnMut(&mut SessionEntry) -> T + Send,
        T: Send,
    {
        let timeout = self.config.store_timeout;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut next = session.entry.clone();
            let out = apply(&mut next);
            next.last_activity = self.clock.now();

            if session.persisted {
                let expected = session.entry.version;
                next.version = expected + 1;
                let stored = bounded(
                    timeout,
                    "update_session",
                    self.repo.update_session_if_version(&next, expected),
                )
                .await?;
                if stored {
                    session.entry = next;
                    return Ok(out);
                }
            } else {
                next.version = 1;
                match bounded(timeout, "insert_session", self.repo.insert_session(&next)).await {
                    Ok(()) => {
                        session.cookie = Some(CookieDirective::Set {
                            kind: CookieKind::Session,
                            value: next.id.clone(),
                            max_age_secs: None,
                        });
                        session.entry = next;
                        session.persisted = true;
                        return Ok(out);
                    }
                    Err(MembershipError::DuplicateKey(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            tracing::debug!(attempt, "Session write conflict; reloading");
            let reloaded =
                bounded(timeout, "find_session", self.repo.find_session(session.id())).await?;
            match reloaded {
                Some(current) => {
                    session.entry = current;
                    session.persisted = true;
                }
                // Destroyed or swept underneath us: never revive the old id or its data
                None => {
                    let binding = ClientBinding {
                        remote_addr: session.entry.remote_addr.clone(),
                        user_agent: session.entry.user_agent.clone(),
                    };
                    *session = self.fresh(&binding)?;
                    tracing::debug!("Session vanished during write; continuing on a fresh entry");
                }
            }
        }

        Err(MembershipError::ConcurrentUpdate("session"))
    }
}

fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use crate::infra::memory::MemoryStore;
    use chrono::{TimeDelta, Utc};

    struct Fixture {
        repo: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        store: SessionStore<MemoryStore>,
    }

    fn fixture(config: MembershipConfig) -> Fixture {
        let repo = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SessionStore::new(repo.clone(), Arc::new(config), clock.clone());
        Fixture { repo, clock, store }
    }

    fn binding(ua: &str) -> ClientBinding {
        ClientBinding::new("10.0.0.1", ua)
    }

    #[tokio::test]
    async fn test_no_cookie_synthesizes_unsaved_session() {
        let f = fixture(MembershipConfig::default());
        let load = f.store.load(None, &binding("UA-A")).await.unwrap();
        assert_eq!(load.outcome, LoadOutcome::NotFound);
        assert!(!load.session.is_persisted());
        assert_eq!(f.repo.session_count(), 0);
    }

    #[tokio::test]
    async fn test_first_mutation_persists_and_sets_cookie() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;

        f.store.set(&mut session, "cart", vec![1, 2, 3]).await.unwrap();
        assert!(session.is_persisted());
        assert_eq!(f.repo.session_count(), 1);

        match session.take_cookie_directive() {
            Some(CookieDirective::Set { kind, value, max_age_secs }) => {
                assert_eq!(kind, CookieKind::Session);
                assert_eq!(value, session.id());
                assert_eq!(max_age_secs, None);
            }
            other => panic!("unexpected directive: {other:?}"),
        }

        // Second mutation: no new cookie
        f.store.set(&mut session, "step", 2).await.unwrap();
        assert!(session.take_cookie_directive().is_none());
        assert_eq!(session.get_as::<Vec<i32>>("cart").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(session.get_as::<i32>("step").unwrap(), Some(2));
        assert!(session.get_as::<String>("step").is_err());
    }

    #[tokio::test]
    async fn test_reload_finds_valid_session_and_refreshes_activity() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "k", "v").await.unwrap();

        f.clock.advance(TimeDelta::seconds(60));
        let load = f.store.load(Some(session.id()), &binding("UA-A")).await.unwrap();
        assert_eq!(load.outcome, LoadOutcome::FoundValid);
        assert_eq!(load.session.get("k"), Some(&serde_json::json!("v")));

        let stored = f.repo.session(session.id()).unwrap();
        assert_eq!(stored.last_activity, f.clock.now());
    }

    #[tokio::test]
    async fn test_idle_session_is_not_found() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "k", "v").await.unwrap();

        f.clock.advance(TimeDelta::seconds(7201));
        let load = f.store.load(Some(session.id()), &binding("UA-A")).await.unwrap();
        assert_eq!(load.outcome, LoadOutcome::NotFound);
        assert_ne!(load.session.id(), session.id());
        assert!(f.repo.session(session.id()).is_none());
    }

    #[tokio::test]
    async fn test_remote_addr_binding() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "k", "v").await.unwrap();

        let moved = ClientBinding::new("10.9.9.9", "UA-A");
        let load = f.store.load(Some(session.id()), &moved).await.unwrap();
        assert_eq!(load.outcome, LoadOutcome::FoundInvalidBinding);
        assert!(f.repo.session(session.id()).is_none());
    }

    #[tokio::test]
    async fn test_portable_when_both_checks_off() {
        let f = fixture(MembershipConfig {
            match_remote_addr: false,
            match_user_agent: false,
            ..MembershipConfig::default()
        });
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "k", "v").await.unwrap();

        let elsewhere = ClientBinding::new("192.0.2.7", "UA-Z");
        let load = f.store.load(Some(session.id()), &elsewhere).await.unwrap();
        assert_eq!(load.outcome, LoadOutcome::FoundValid);
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_not_looked_up() {
        let f = fixture(MembershipConfig::default());
        let load = f
            .store
            .load(Some("not a session id!"), &binding("UA-A"))
            .await
            .unwrap();
        assert_eq!(load.outcome, LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_flash_is_read_once() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set_flash(&mut session, "notice", "Saved").await.unwrap();
        assert_eq!(session.peek_flash("notice"), Some(&serde_json::json!("Saved")));

        let first = f.store.take_flash(&mut session, "notice").await.unwrap();
        assert_eq!(first, Some(serde_json::json!("Saved")));
        let second = f.store.take_flash(&mut session, "notice").await.unwrap();
        assert_eq!(second, None);

        // Also gone from the store
        let stored = f.repo.session(session.id()).unwrap();
        assert!(stored.flash_data.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_take_flash_yields_one_value() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set_flash(&mut session, "notice", "Saved").await.unwrap();

        // Two handles on the same stored entry (two tabs)
        let mut tab_a = session.clone();
        let mut tab_b = session.clone();
        let a = f.store.take_flash(&mut tab_a, "notice").await.unwrap();
        let b = f.store.take_flash(&mut tab_b, "notice").await.unwrap();
        assert_eq!(
            [a.is_some(), b.is_some()].iter().filter(|taken| **taken).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_handle_reapplies_on_conflict() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "a", 1).await.unwrap();

        let mut stale = session.clone();
        f.store.set(&mut session, "b", 2).await.unwrap();
        f.store.set(&mut stale, "c", 3).await.unwrap();

        let stored = f.repo.session(session.id()).unwrap();
        assert_eq!(stored.data.len(), 3);
        assert_eq!(stored.version, 3);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "a", 1).await.unwrap();
        f.store.set(&mut session, "b", 2).await.unwrap();
        f.store.set_flash(&mut session, "f", true).await.unwrap();

        assert_eq!(
            f.store.delete(&mut session, "a").await.unwrap(),
            Some(serde_json::json!(1))
        );
        assert_eq!(f.store.delete(&mut session, "a").await.unwrap(), None);

        f.store.delete_all(&mut session, false).await.unwrap();
        assert!(session.entry().data.is_empty());
        assert!(session.peek_flash("f").is_some());

        f.store.delete_all(&mut session, true).await.unwrap();
        assert!(session.entry().flash_data.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_deletes_and_clears_cookie() {
        let f = fixture(MembershipConfig::default());
        let mut session = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut session, "a", 1).await.unwrap();
        let old_id = session.id().to_string();
        let _ = session.take_cookie_directive();

        f.store.destroy(&mut session).await.unwrap();
        assert!(f.repo.session(&old_id).is_none());
        assert_ne!(session.id(), old_id);
        assert!(!session.is_persisted());
        assert_eq!(
            session.take_cookie_directive(),
            Some(CookieDirective::Clear {
                kind: CookieKind::Session
            })
        );
    }

    #[tokio::test]
    async fn test_destroyed_session_is_not_revived_by_another_handle() {
        let f = fixture(MembershipConfig::default());
        let mut tab_a = f.store.load(None, &binding("UA-A")).await.unwrap().session;
        f.store.set(&mut tab_a, "membership.login", "alice").await.unwrap();
        let _ = tab_a.take_cookie_directive();
        let old_id = tab_a.id().to_string();
        let mut tab_b = tab_a.clone();

        f.store.destroy(&mut tab_a).await.unwrap();
        f.store.set(&mut tab_b, "theme", "dark").await.unwrap();

        assert!(f.repo.session(&old_id).is_none());
        assert_ne!(tab_b.id(), old_id);
        assert!(tab_b.get("membership.login").is_none());
        assert_eq!(tab_b.get("theme"), Some(&serde_json::json!("dark")));

        let stored = f.repo.session(tab_b.id()).unwrap();
        assert!(!stored.data.contains_key("membership.login"));
        match tab_b.take_cookie_directive() {
            Some(CookieDirective::Set { value, .. }) => assert_eq!(value, tab_b.id()),
            other => panic!("unexpected directive: {other:?}"),
        }
    }
}
