//! Authentication Orchestrator
//!
//! The only component the web layer talks to. Owns the credential manager,
//! session store adapter, remember-me manager and presence tracker, and
//! carries per-request state in a [`RequestContext`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::IdentityId;
use platform::client::ClientBinding;
use platform::password::ClearTextSecret;

use crate::application::clock::{Clock, SystemClock};
use crate::application::config::MembershipConfig;
use crate::application::credentials::{CredentialManager, DefaultFormatChecker, FormatChecker};
use crate::application::notifier::{NotificationEvent, Notifier, TracingNotifier};
use crate::application::presence::PresenceTracker;
use crate::application::remember::{RememberManager, RememberResolution};
use crate::application::sessions::{LoadOutcome, Session, SessionLoad, SessionStore};
use crate::application::store_call::bounded;
use crate::domain::entity::identity::Identity;
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::domain::value_object::cookie_directive::{CookieDirective, CookieKind};
use crate::domain::value_object::email::Email;
use crate::domain::value_object::login_stamp::LoginStamp;
use crate::domain::value_object::profile::Profile;
use crate::error::{MembershipError, MembershipResult};

/// Cookies and client binding presented by a request
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub session_cookie: Option<String>,
    pub remember_cookie: Option<String>,
    pub binding: ClientBinding,
}

/// Who the caller is, and how that was established
#[derive(Debug, Clone)]
pub enum AuthState {
    Anonymous,
    AuthenticatedViaSession(Identity),
    AuthenticatedViaRemember(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Anonymous => None,
            AuthState::AuthenticatedViaSession(identity)
            | AuthState::AuthenticatedViaRemember(identity) => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthState::Anonymous)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::AuthenticatedViaSession(_) => "session",
            AuthState::AuthenticatedViaRemember(_) => "remember",
        }
    }
}

/// Outcome of [`Membership::validate_credentials`]
#[derive(Debug, Clone)]
pub enum CredentialCheck {
    Valid(Identity),
    InvalidSecret,
    /// Secret was correct but the identity awaits approval
    NotApproved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOptions {
    pub approved: bool,
    /// Emit `AccountAdded`
    pub notify: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            approved: true,
            notify: true,
        }
    }
}

/// Per-request state
#[derive(Debug)]
pub struct RequestContext {
    session: Session,
    outcome: LoadOutcome,
    binding: ClientBinding,
    remember_cookie: Option<String>,
    current: Option<IdentityId>,
    cookies: Vec<CookieDirective>,
}

impl RequestContext {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        self.outcome
    }

    pub fn binding(&self) -> &ClientBinding {
        &self.binding
    }

    /// Set by a successful resolution or login
    pub fn current_identity(&self) -> Option<IdentityId> {
        self.current
    }

    /// Pending cookie changes; the latest directive per cookie wins
    pub fn cookie_directives(&mut self) -> Vec<CookieDirective> {
        if let Some(directive) = self.session.take_cookie_directive() {
            self.push_cookie(directive);
        }
        std::mem::take(&mut self.cookies)
    }

    fn push_cookie(&mut self, directive: CookieDirective) {
        self.cookies.retain(|d| d.kind() != directive.kind());
        self.cookies.push(directive);
    }

    fn set_remember_cookie(&mut self, value: String, max_age_secs: i64) {
        self.remember_cookie = Some(value.clone());
        self.push_cookie(CookieDirective::Set {
            kind: CookieKind::Remember,
            value,
            max_age_secs: Some(max_age_secs),
        });
    }

    fn clear_remember_cookie(&mut self) {
        self.remember_cookie = None;
        self.push_cookie(CookieDirective::Clear {
            kind: CookieKind::Remember,
        });
    }
}

/// Authentication orchestrator
pub struct Membership<R, N = TracingNotifier>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    repo: Arc<R>,
    config: Arc<MembershipConfig>,
    clock: Arc<dyn Clock>,
    credentials: CredentialManager,
    format: Arc<dyn FormatChecker>,
    notifier: Arc<N>,
    sessions: SessionStore<R>,
    remember: RememberManager<R>,
    presence: PresenceTracker<R>,
}

impl<R> Membership<R, TracingNotifier>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    /// SHA-256 credentials, default format rules, wall clock, log-only notifier
    pub fn new(repo: Arc<R>, config: Arc<MembershipConfig>) -> MembershipResult<Self> {
        let format = DefaultFormatChecker::with_min_length(config.min_password_length);
        Ok(Self::from_parts(
            repo,
            config,
            Arc::new(SystemClock),
            CredentialManager::sha256()?,
            Arc::new(format),
            Arc::new(TracingNotifier),
        ))
    }
}

impl<R, N> Membership<R, N>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn from_parts(
        repo: Arc<R>,
        config: Arc<MembershipConfig>,
        clock: Arc<dyn Clock>,
        credentials: CredentialManager,
        format: Arc<dyn FormatChecker>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(repo.clone(), config.clone(), clock.clone()),
            remember: RememberManager::new(repo.clone(), config.clone(), clock.clone()),
            presence: PresenceTracker::new(repo.clone(), config.clone(), clock.clone()),
            repo,
            config,
            clock,
            credentials,
            format,
            notifier,
        }
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore<R> {
        &self.sessions
    }

    pub fn remember(&self) -> &RememberManager<R> {
        &self.remember
    }

    pub fn presence(&self) -> &PresenceTracker<R> {
        &self.presence
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    // ------------------------------------------------------------------
    // Request lifecycle
    // ------------------------------------------------------------------

    /// Load the session for a request; a store failure yields a fresh one
    pub async fn begin(&self, presented: RequestCredentials) -> MembershipResult<RequestContext> {
        let RequestCredentials {
            session_cookie,
            remember_cookie,
            binding,
        } = presented;

        let load = match self.sessions.load(session_cookie.as_deref(), &binding).await {
            Ok(load) => load,
            Err(e) => {
                e.log();
                SessionLoad {
                    session: self.sessions.fresh(&binding)?,
                    outcome: LoadOutcome::NotFound,
                }
            }
        };

        let mut ctx = RequestContext {
            session: load.session,
            outcome: load.outcome,
            binding,
            remember_cookie,
            current: None,
            cookies: Vec::new(),
        };
        // The stale cookie points at a deleted entry
        if ctx.outcome == LoadOutcome::FoundInvalidBinding {
            ctx.push_cookie(CookieDirective::Clear {
                kind: CookieKind::Session,
            });
        }
        Ok(ctx)
    }

    /// Remember-me cookie first, then the session login stamp, else anonymous.
    ///
    /// Never fails: store errors on this path degrade to `Anonymous`.
    pub async fn resolve_current_user(&self, ctx: &mut RequestContext) -> AuthState {
        if let Some(identity) = self.resolve_remembered(ctx).await {
            ctx.current = Some(identity.id);
            return AuthState::AuthenticatedViaRemember(identity);
        }

        match self.resolve_session_stamp(ctx).await {
            Ok(Some(identity)) => {
                ctx.current = Some(identity.id);
                AuthState::AuthenticatedViaSession(identity)
            }
            Ok(None) => AuthState::Anonymous,
            Err(e) => {
                e.log();
                AuthState::Anonymous
            }
        }
    }

    async fn resolve_remembered(&self, ctx: &mut RequestContext) -> Option<Identity> {
        let cookie = ctx.remember_cookie.clone()?;

        match self.remember.resolve(&cookie).await {
            Ok(RememberResolution::Valid {
                mut identity,
                cookie,
                expires_at,
            }) => {
                let now = self.clock.now();
                self.refresh_activity(&mut identity, now).await;
                ctx.set_remember_cookie(cookie, remaining_secs(expires_at, now));
                tracing::debug!(identity_id = %identity.id, "Authenticated via remember-me");
                Some(identity)
            }
            Ok(RememberResolution::ConcurrentUse) => None,
            Ok(
                RememberResolution::Compromised
                | RememberResolution::Expired
                | RememberResolution::NotRemembered,
            )
            | Err(MembershipError::InvalidId) => {
                ctx.clear_remember_cookie();
                None
            }
            Err(e) => {
                e.log();
                None
            }
        }
    }

    async fn resolve_session_stamp(
        &self,
        ctx: &mut RequestContext,
    ) -> MembershipResult<Option<Identity>> {
        let key = self.config.login_key.as_str();
        let stamp = match ctx.session.get_as::<LoginStamp>(key) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable login stamp discarded");
                self.sessions.delete(&mut ctx.session, key).await?;
                return Ok(None);
            }
        };
        let Some(stamp) = stamp else {
            return Ok(None);
        };

        let now = self.clock.now();
        if !stamp.is_fresh(self.config.online_threshold_delta(), now) {
            self.sessions.delete(&mut ctx.session, key).await?;
            tracing::debug!(identity_id = %stamp.identity_id(), "Login stamp went stale");
            return Ok(None);
        }

        let found = bounded(
            self.config.store_timeout,
            "find_identity",
            self.repo.find_identity(stamp.identity_id()),
        )
        .await?;
        let Some(mut identity) = found else {
            self.sessions.delete(&mut ctx.session, key).await?;
            return Ok(None);
        };

        self.sessions
            .set(&mut ctx.session, key, LoginStamp::new(identity.id, now))
            .await?;
        self.refresh_activity(&mut identity, now).await;
        Ok(Some(identity))
    }

    /// Establish `identity` for this and later requests.
    ///
    /// `remember_secs > 0` issues a remember-me cookie; otherwise the session
    /// carries a login stamp.
    pub async fn login(
        &self,
        ctx: &mut RequestContext,
        identity: &Identity,
        remember_secs: i64,
    ) -> MembershipResult<()> {
        let now = self.clock.now();
        let key = self.config.login_key.as_str();

        if remember_secs > 0 {
            let issued = self
                .remember
                .issue(identity.id, Duration::from_secs(remember_secs.unsigned_abs()))
                .await?;
            ctx.set_remember_cookie(issued.cookie, remember_secs);
            self.sessions.delete(&mut ctx.session, key).await?;
        } else {
            self.sessions
                .set(&mut ctx.session, key, LoginStamp::new(identity.id, now))
                .await?;
        }

        let mut identity = identity.clone();
        self.refresh_activity(&mut identity, now).await;
        ctx.current = Some(identity.id);

        tracing::info!(
            identity_id = %identity.id,
            remembered = remember_secs > 0,
            "Identity logged in"
        );
        Ok(())
    }

    /// Revoke the remember-me entry and drop the login stamp.
    ///
    /// The session entry itself survives.
    pub async fn logout(&self, ctx: &mut RequestContext) -> MembershipResult<()> {
        let key = self.config.login_key.as_str();

        let mut identity_id = ctx.current;
        if identity_id.is_none() {
            // Only trust the id inside a remember cookie once it resolves
            identity_id = self.resolve_remembered(ctx).await.map(|identity| identity.id);
        }
        if identity_id.is_none() {
            identity_id = ctx
                .session
                .get_as::<LoginStamp>(key)
                .ok()
                .flatten()
                .map(|stamp| stamp.identity_id());
        }

        if let Some(id) = identity_id {
            self.remember.revoke(id).await?;
        }
        if ctx.remember_cookie.is_some() || identity_id.is_some() {
            ctx.clear_remember_cookie();
        }
        self.sessions.delete(&mut ctx.session, key).await?;
        ctx.current = None;

        if let Some(id) = identity_id {
            tracing::info!(identity_id = %id, "Identity logged out");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Account operations
    // ------------------------------------------------------------------

    /// Look up by email and check the secret.
    ///
    /// An unknown (or malformed) email is `NotFound`.
    pub async fn validate_credentials(
        &self,
        email: &str,
        secret: &ClearTextSecret,
    ) -> MembershipResult<CredentialCheck> {
        let email = Email::new(email).map_err(|_| MembershipError::NotFound("identity"))?;
        let identity = bounded(
            self.config.store_timeout,
            "find_identity_by_email",
            self.repo.find_identity_by_email(&email),
        )
        .await?
        .ok_or(MembershipError::NotFound("identity"))?;

        if !self.credentials.verify(secret, &identity.credential) {
            tracing::debug!(identity_id = %identity.id, "Secret rejected");
            return Ok(CredentialCheck::InvalidSecret);
        }
        if !identity.approved {
            return Ok(CredentialCheck::NotApproved);
        }
        Ok(CredentialCheck::Valid(identity))
    }

    pub async fn register(
        &self,
        email: &str,
        secret: &ClearTextSecret,
        options: RegisterOptions,
    ) -> MembershipResult<Identity> {
        self.register_with_profile(email, secret, Profile::default(), options)
            .await
    }

    /// Register with personal details filled in up front
    pub async fn register_with_profile(
        &self,
        email: &str,
        secret: &ClearTextSecret,
        profile: Profile,
        options: RegisterOptions,
    ) -> MembershipResult<Identity> {
        let email = self.format.check_email(email)?;
        self.format.check_secret(secret)?;
        let profile = profile.normalized(self.clock.now().date_naive())?;

        let timeout = self.config.store_timeout;
        let existing = bounded(
            timeout,
            "find_identity_by_email",
            self.repo.find_identity_by_email(&email),
        )
        .await?;
        if existing.is_some() {
            return Err(MembershipError::DuplicateIdentity);
        }

        let now = self.clock.now();
        let credential = self.credentials.derive(secret, now)?;
        let mut identity = Identity::new(email, credential, options.approved, now);
        identity.profile = profile;
        bounded(timeout, "insert_identity", self.repo.insert_identity(&identity)).await?;

        tracing::info!(
            identity_id = %identity.id,
            approved = identity.approved,
            "Identity registered"
        );
        if options.notify {
            self.notify(NotificationEvent::AccountAdded, &identity).await;
        }
        Ok(identity)
    }

    /// Rotate the credential and revoke any remember-me entry
    pub async fn change_secret(
        &self,
        id: IdentityId,
        new_secret: &ClearTextSecret,
    ) -> MembershipResult<Identity> {
        self.format.check_secret(new_secret)?;
        let mut identity = self.require_identity(id).await?;

        let now = self.clock.now();
        let (next, _) = self
            .credentials
            .rotate(identity.credential.clone(), new_secret, now)?;
        identity.replace_credential(next, now);
        bounded(
            self.config.store_timeout,
            "update_identity",
            self.repo.update_identity(&identity),
        )
        .await?;
        self.remember.revoke(id).await?;

        tracing::info!(identity_id = %id, "Secret changed");
        self.notify(NotificationEvent::PasswordChanged, &identity).await;
        Ok(identity)
    }

    /// Replace the personal details; email and credentials are untouched
    pub async fn update_profile(&self, id: IdentityId, profile: Profile) -> MembershipResult<Identity> {
        let now = self.clock.now();
        let profile = profile.normalized(now.date_naive())?;
        let mut identity = self.require_identity(id).await?;
        if identity.profile == profile {
            return Ok(identity);
        }

        identity.replace_profile(profile, now);
        bounded(
            self.config.store_timeout,
            "update_identity",
            self.repo.update_identity(&identity),
        )
        .await?;

        tracing::info!(identity_id = %id, "Profile updated");
        self.notify(NotificationEvent::AccountInfoChanged, &identity).await;
        Ok(identity)
    }

    pub async fn approve(&self, id: IdentityId) -> MembershipResult<Identity> {
        let mut identity = self.require_identity(id).await?;
        if identity.approved {
            return Ok(identity);
        }

        identity.approve(self.clock.now());
        bounded(
            self.config.store_timeout,
            "update_identity",
            self.repo.update_identity(&identity),
        )
        .await?;

        tracing::info!(identity_id = %id, "Identity approved");
        self.notify(NotificationEvent::AccountApproved, &identity).await;
        Ok(identity)
    }

    /// Revoke remember-me first, then delete. Sessions stamped with this id
    /// fail closed on their next resolution.
    pub async fn delete_identity(&self, id: IdentityId) -> MembershipResult<bool> {
        self.remember.revoke(id).await?;
        let deleted = bounded(
            self.config.store_timeout,
            "delete_identity",
            self.repo.delete_identity(id),
        )
        .await?;
        if deleted {
            tracing::info!(identity_id = %id, "Identity deleted");
        }
        Ok(deleted)
    }

    pub async fn find_identity(&self, id: IdentityId) -> MembershipResult<Option<Identity>> {
        bounded(
            self.config.store_timeout,
            "find_identity",
            self.repo.find_identity(id),
        )
        .await
    }

    pub async fn find_identity_by_email(&self, email: &str) -> MembershipResult<Option<Identity>> {
        let email = Email::new(email)?;
        bounded(
            self.config.store_timeout,
            "find_identity_by_email",
            self.repo.find_identity_by_email(&email),
        )
        .await
    }

    pub async fn list_identities(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        self.presence.list_identities(after, limit).await
    }

    pub async fn count_online(&self) -> MembershipResult<u64> {
        self.presence.count_online().await
    }

    pub async fn list_online(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        self.presence.list_online(after, limit).await
    }

    /// Purge idle sessions and expired remember-me entries.
    ///
    /// Returns `(sessions, remember_entries)` removed.
    pub async fn purge_expired(&self) -> MembershipResult<(u64, u64)> {
        let now = self.clock.now();
        let timeout = self.config.store_timeout;

        let idle_before = now
            .checked_sub_signed(self.config.session_ttl_delta())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let sessions = bounded(
            timeout,
            "purge_idle_sessions",
            self.repo.purge_idle_sessions(idle_before),
        )
        .await?;

        let expired_before = now
            .checked_sub_signed(self.config.remember_clock_skew_delta())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let remembered = bounded(
            timeout,
            "purge_expired_remember",
            self.repo.purge_expired_remember(expired_before),
        )
        .await?;

        if sessions > 0 || remembered > 0 {
            tracing::info!(sessions, remembered, "Purged expired membership records");
        }
        Ok((sessions, remembered))
    }

    async fn require_identity(&self, id: IdentityId) -> MembershipResult<Identity> {
        self.find_identity(id)
            .await?
            .ok_or(MembershipError::NotFound("identity"))
    }

    /// Best effort; a failed activity write never fails the request
    async fn refresh_activity(&self, identity: &mut Identity, now: DateTime<Utc>) {
        identity.record_activity(now);
        if let Err(e) = bounded(
            self.config.store_timeout,
            "touch_identity",
            self.repo.touch_identity(identity.id, now),
        )
        .await
        {
            e.log();
        }
    }

    async fn notify(&self, event: NotificationEvent, identity: &Identity) {
        if let Err(e) = self.notifier.notify(event, identity).await {
            tracing::warn!(
                event = %event,
                identity_id = %identity.id,
                error = %e,
                "Notification failed"
            );
        }
    }
}

fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    expires_at.signed_duration_since(now).num_seconds().max(0)
}
