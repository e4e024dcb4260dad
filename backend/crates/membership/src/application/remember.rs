//! Remember-Me Manager
//!
//! Durable login independent of the session TTL. The token is rotated on
//! every successful use, so a previously observed cookie is worthless after
//! one legitimate use and its replay is detectable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::IdentityId;
use platform::crypto::{constant_time_eq, random_url_token};

use crate::application::clock::Clock;
use crate::application::config::{MembershipConfig, to_delta};
use crate::application::store_call::bounded;
use crate::domain::entity::{identity::Identity, remember_entry::RememberEntry};
use crate::domain::repository::{IdentityRepository, RememberRepository};
use crate::domain::value_object::remember_cookie::RememberCookie;
use crate::error::{MembershipError, MembershipResult};

/// Random bytes behind a remember-me token
pub const REMEMBER_TOKEN_BYTES: usize = 128;

/// Result of [`RememberManager::issue`]
#[derive(Debug, Clone)]
pub struct IssuedRemember {
    pub cookie: String,
    pub expires_at: DateTime<Utc>,
    pub max_age_secs: i64,
}

#[derive(Debug)]
pub enum RememberResolution {
    /// Token matched and was rotated; `cookie` replaces the presented one
    Valid {
        identity: Identity,
        cookie: String,
        expires_at: DateTime<Utc>,
    },
    /// No entry, or the identity is gone
    NotRemembered,
    /// Token mismatch; the entry has been revoked
    Compromised,
    /// Past expiry; the entry has been deleted
    Expired,
    /// Another request rotated the same token first
    ConcurrentUse,
}

/// Remember-me manager
pub struct RememberManager<R>
where
    R: IdentityRepository + RememberRepository + Send + Sync + 'static,
{
    repo: Arc<R>,
    config: Arc<MembershipConfig>,
    clock: Arc<dyn Clock>,
}

impl<R> RememberManager<R>
where
    R: IdentityRepository + RememberRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<MembershipConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Store a new token for `identity_id`, replacing any previous one
    pub async fn issue(
        &self,
        identity_id: IdentityId,
        duration: Duration,
    ) -> MembershipResult<IssuedRemember> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(to_delta(duration))
            .ok_or_else(|| MembershipError::Internal("remember duration out of range".into()))?;

        let entry = RememberEntry {
            identity_id,
            token: random_url_token(REMEMBER_TOKEN_BYTES)?,
            expires_at,
            issued_at: now,
        };
        bounded(
            self.config.store_timeout,
            "upsert_remember",
            self.repo.upsert_remember(&entry),
        )
        .await?;

        tracing::info!(%identity_id, %expires_at, "Remember-me token issued");

        Ok(IssuedRemember {
            cookie: RememberCookie::new(identity_id, entry.token.as_str()).encode(),
            expires_at,
            max_age_secs: entry.remaining_secs(now),
        })
    }

    /// Validate a presented cookie and rotate its token.
    ///
    /// A malformed cookie is `InvalidId`; every other rejection is an outcome.
    ///
    /// Two requests carrying the same cookie race on the compare-and-swap. A
    /// loser that read the entry before the winner committed gets
    /// `ConcurrentUse`. A loser that reads after the commit sees the rotated
    /// token, so it gets `Compromised` and deletes the winner's fresh entry.
    pub async fn resolve(&self, cookie: &str) -> MembershipResult<RememberResolution> {
        let timeout = self.config.store_timeout;
        let presented = RememberCookie::parse(cookie)?;
        let identity_id = presented.identity_id;
        let now = self.clock.now();

        let stored = bounded(timeout, "find_remember", self.repo.find_remember(identity_id)).await?;
        let Some(stored) = stored else {
            tracing::debug!(%identity_id, "No remember-me entry");
            return Ok(RememberResolution::NotRemembered);
        };

        if !constant_time_eq(stored.token.as_bytes(), presented.token.as_bytes()) {
            self.discard(identity_id).await;
            tracing::warn!(%identity_id, "Remember-me token mismatch; entry revoked");
            return Ok(RememberResolution::Compromised);
        }

        if stored.is_expired(now, self.config.remember_clock_skew_delta()) {
            self.discard(identity_id).await;
            tracing::debug!(%identity_id, "Remember-me entry expired");
            return Ok(RememberResolution::Expired);
        }

        let identity = bounded(timeout, "find_identity", self.repo.find_identity(identity_id)).await?;
        let Some(identity) = identity else {
            self.discard(identity_id).await;
            tracing::debug!(%identity_id, "Remember-me entry for a deleted identity");
            return Ok(RememberResolution::NotRemembered);
        };

        let rotated = stored.rotated(random_url_token(REMEMBER_TOKEN_BYTES)?, now);
        let swapped = bounded(
            timeout,
            "replace_remember_token",
            self.repo.replace_remember_token(&stored.token, &rotated),
        )
        .await?;
        if !swapped {
            tracing::debug!(%identity_id, "Remember-me token rotated by a concurrent request");
            return Ok(RememberResolution::ConcurrentUse);
        }

        Ok(RememberResolution::Valid {
            identity,
            cookie: RememberCookie::new(identity_id, rotated.token).encode(),
            expires_at: rotated.expires_at,
        })
    }

    /// Delete the entry for `identity_id`
    pub async fn revoke(&self, identity_id: IdentityId) -> MembershipResult<bool> {
        let deleted = bounded(
            self.config.store_timeout,
            "delete_remember",
            self.repo.delete_remember(identity_id),
        )
        .await?;
        if deleted {
            tracing::info!(%identity_id, "Remember-me entry revoked");
        }
        Ok(deleted)
    }

    /// Best-effort delete on a rejection path; the rejection stands either way
    async fn discard(&self, identity_id: IdentityId) {
        if let Err(e) = bounded(
            self.config.store_timeout,
            "delete_remember",
            self.repo.delete_remember(identity_id),
        )
        .await
        {
            e.log();
        }
    }
}
