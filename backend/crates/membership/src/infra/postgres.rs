//! PostgreSQL Repository Implementations

use chrono::{DateTime, NaiveDate, Utc};
use kernel::error::conversions::is_unique_violation;
use kernel::id::IdentityId;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::entity::{
    identity::{Credential, Identity},
    remember_entry::RememberEntry,
    session_entry::{SessionEntry, SessionValues},
};
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::domain::value_object::email::Email;
use crate::domain::value_object::profile::Profile;
use crate::error::{MembershipError, MembershipResult};

/// PostgreSQL-backed membership store
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete idle sessions and expired remember-me entries
    pub async fn purge_expired(
        &self,
        idle_before: DateTime<Utc>,
        expired_before: DateTime<Utc>,
    ) -> MembershipResult<(u64, u64)> {
        let sessions = self.purge_idle_sessions(idle_before).await?;
        let remembered = self.purge_expired_remember(expired_before).await?;

        tracing::info!(
            sessions_deleted = sessions,
            remember_deleted = remembered,
            "Purged expired membership records"
        );

        Ok((sessions, remembered))
    }
}

fn to_i64(value: u64, what: &'static str) -> MembershipResult<i64> {
    i64::try_from(value).map_err(|_| MembershipError::Internal(format!("{what} out of range")))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// ============================================================================
// Identity Repository Implementation
// ============================================================================

const IDENTITY_COLUMNS: &str = r#"
    id,
    email,
    hashed_secret,
    salt,
    algorithm,
    credential_created_at,
    previous_hashed_secret,
    previous_salt,
    previous_algorithm,
    previous_created_at,
    approved,
    first_name,
    middle_name,
    last_name,
    nick_name,
    birthday,
    join_day,
    last_activity,
    created_at,
    updated_at
"#;

impl IdentityRepository for PgMembershipStore {
    async fn insert_identity(&self, identity: &Identity) -> MembershipResult<()> {
        let previous = identity.previous_credential.as_ref();

        sqlx::query(
            r#"
            INSERT INTO identities (
                id,
                email,
                hashed_secret,
                salt,
                algorithm,
                credential_created_at,
                previous_hashed_secret,
                previous_salt,
                previous_algorithm,
                previous_created_at,
                approved,
                first_name,
                middle_name,
                last_name,
                nick_name,
                birthday,
                join_day,
                last_activity,
                created_at,
                updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(identity.email.as_str())
        .bind(&identity.credential.hashed_secret)
        .bind(&identity.credential.salt)
        .bind(&identity.credential.algorithm)
        .bind(identity.credential.created_at)
        .bind(previous.map(|c| c.hashed_secret.as_slice()))
        .bind(previous.map(|c| c.salt.as_slice()))
        .bind(previous.map(|c| c.algorithm.as_str()))
        .bind(previous.map(|c| c.created_at))
        .bind(identity.approved)
        .bind(identity.profile.first_name.as_deref())
        .bind(identity.profile.middle_name.as_deref())
        .bind(identity.profile.last_name.as_deref())
        .bind(identity.profile.nick_name.as_deref())
        .bind(identity.profile.birthday)
        .bind(identity.join_day)
        .bind(identity.last_activity)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MembershipError::DuplicateIdentity
            } else {
                MembershipError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find_identity(&self, id: IdentityId) -> MembershipResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(IdentityRow::into_identity))
    }

    async fn find_identity_by_email(&self, email: &Email) -> MembershipResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(IdentityRow::into_identity))
    }

    async fn update_identity(&self, identity: &Identity) -> MembershipResult<()> {
        let previous = identity.previous_credential.as_ref();

        let updated = sqlx::query(
            r#"
            UPDATE identities SET
                hashed_secret = $2,
                salt = $3,
                algorithm = $4,
                credential_created_at = $5,
                previous_hashed_secret = $6,
                previous_salt = $7,
                previous_algorithm = $8,
                previous_created_at = $9,
                approved = $10,
                first_name = $11,
                middle_name = $12,
                last_name = $13,
                nick_name = $14,
                birthday = $15,
                last_activity = $16,
                updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.credential.hashed_secret)
        .bind(&identity.credential.salt)
        .bind(&identity.credential.algorithm)
        .bind(identity.credential.created_at)
        .bind(previous.map(|c| c.hashed_secret.as_slice()))
        .bind(previous.map(|c| c.salt.as_slice()))
        .bind(previous.map(|c| c.algorithm.as_str()))
        .bind(previous.map(|c| c.created_at))
        .bind(identity.approved)
        .bind(identity.profile.first_name.as_deref())
        .bind(identity.profile.middle_name.as_deref())
        .bind(identity.profile.last_name.as_deref())
        .bind(identity.profile.nick_name.as_deref())
        .bind(identity.profile.birthday)
        .bind(identity.last_activity)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(MembershipError::NotFound("identity"));
        }
        Ok(())
    }

    async fn delete_identity(&self, id: IdentityId) -> MembershipResult<bool> {
        let deleted = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn touch_identity(&self, id: IdentityId, at: DateTime<Utc>) -> MembershipResult<()> {
        sqlx::query("UPDATE identities SET last_activity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_identities(
        &self,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            SELECT {IDENTITY_COLUMNS}
            FROM identities
            WHERE ($1::uuid IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
            "#
        ))
        .bind(after.map(IdentityId::into_uuid))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IdentityRow::into_identity).collect())
    }

    async fn count_active_since(&self, since: DateTime<Utc>) -> MembershipResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM identities WHERE last_activity >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn list_active_since(
        &self,
        since: DateTime<Utc>,
        after: Option<IdentityId>,
        limit: usize,
    ) -> MembershipResult<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            r#"
            SELECT {IDENTITY_COLUMNS}
            FROM identities
            WHERE last_activity >= $1
              AND ($2::uuid IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#
        ))
        .bind(since)
        .bind(after.map(IdentityId::into_uuid))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IdentityRow::into_identity).collect())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgMembershipStore {
    async fn find_session(&self, id: &str) -> MembershipResult<Option<SessionEntry>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                id,
                remote_addr,
                user_agent,
                last_activity,
                data,
                flash_data,
                version
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_entry))
    }

    async fn insert_session(&self, entry: &SessionEntry) -> MembershipResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id,
                remote_addr,
                user_agent,
                last_activity,
                data,
                flash_data,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.remote_addr)
        .bind(&entry.user_agent)
        .bind(entry.last_activity)
        .bind(Json(&entry.data))
        .bind(Json(&entry.flash_data))
        .bind(to_i64(entry.version, "session version")?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MembershipError::DuplicateKey("sessions")
            } else {
                MembershipError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn update_session_if_version(
        &self,
        entry: &SessionEntry,
        expected_version: u64,
    ) -> MembershipResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE sessions SET
                last_activity = $2,
                data = $3,
                flash_data = $4,
                version = $5
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(&entry.id)
        .bind(entry.last_activity)
        .bind(Json(&entry.data))
        .bind(Json(&entry.flash_data))
        .bind(to_i64(entry.version, "session version")?)
        .bind(to_i64(expected_version, "session version")?)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> MembershipResult<()> {
        sqlx::query("UPDATE sessions SET last_activity = GREATEST(last_activity, $2) WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_session(&self, id: &str) -> MembershipResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> MembershipResult<u64> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(idle_before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Remember Repository Implementation
// ============================================================================

impl RememberRepository for PgMembershipStore {
    async fn find_remember(
        &self,
        identity_id: IdentityId,
    ) -> MembershipResult<Option<RememberEntry>> {
        let row = sqlx::query_as::<_, RememberRow>(
            r#"
            SELECT identity_id, token, expires_at, issued_at
            FROM remember_entries
            WHERE identity_id = $1
            "#,
        )
        .bind(identity_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RememberRow::into_entry))
    }

    async fn upsert_remember(&self, entry: &RememberEntry) -> MembershipResult<()> {
        sqlx::query(
            r#"
            INSERT INTO remember_entries (identity_id, token, expires_at, issued_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (identity_id) DO UPDATE SET
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                issued_at = EXCLUDED.issued_at
            "#,
        )
        .bind(entry.identity_id.as_uuid())
        .bind(&entry.token)
        .bind(entry.expires_at)
        .bind(entry.issued_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_remember_token(
        &self,
        expected_token: &str,
        entry: &RememberEntry,
    ) -> MembershipResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE remember_entries SET
                token = $3,
                expires_at = $4,
                issued_at = $5
            WHERE identity_id = $1 AND token = $2
            "#,
        )
        .bind(entry.identity_id.as_uuid())
        .bind(expected_token)
        .bind(&entry.token)
        .bind(entry.expires_at)
        .bind(entry.issued_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn delete_remember(&self, identity_id: IdentityId) -> MembershipResult<bool> {
        let deleted = sqlx::query("DELETE FROM remember_entries WHERE identity_id = $1")
            .bind(identity_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn purge_expired_remember(&self, before: DateTime<Utc>) -> MembershipResult<u64> {
        let deleted = sqlx::query("DELETE FROM remember_entries WHERE expires_at <= $1")
            .bind(before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    hashed_secret: Vec<u8>,
    salt: Vec<u8>,
    algorithm: String,
    credential_created_at: DateTime<Utc>,
    previous_hashed_secret: Option<Vec<u8>>,
    previous_salt: Option<Vec<u8>>,
    previous_algorithm: Option<String>,
    previous_created_at: Option<DateTime<Utc>>,
    approved: bool,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    nick_name: Option<String>,
    birthday: Option<NaiveDate>,
    join_day: NaiveDate,
    last_activity: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self) -> Identity {
        let previous_credential = match (
            self.previous_hashed_secret,
            self.previous_salt,
            self.previous_algorithm,
            self.previous_created_at,
        ) {
            (Some(hashed_secret), Some(salt), Some(algorithm), Some(created_at)) => {
                Some(Credential {
                    hashed_secret,
                    salt,
                    algorithm,
                    created_at,
                })
            }
            _ => None,
        };

        Identity {
            id: IdentityId::from_uuid(self.id),
            email: Email::from_db(self.email),
            credential: Credential {
                hashed_secret: self.hashed_secret,
                salt: self.salt,
                algorithm: self.algorithm,
                created_at: self.credential_created_at,
            },
            previous_credential,
            approved: self.approved,
            profile: Profile {
                first_name: self.first_name,
                middle_name: self.middle_name,
                last_name: self.last_name,
                nick_name: self.nick_name,
                birthday: self.birthday,
            },
            join_day: self.join_day,
            last_activity: self.last_activity,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    remote_addr: String,
    user_agent: String,
    last_activity: DateTime<Utc>,
    data: Json<SessionValues>,
    flash_data: Json<SessionValues>,
    version: i64,
}

impl SessionRow {
    fn into_entry(self) -> SessionEntry {
        SessionEntry {
            id: self.id,
            remote_addr: self.remote_addr,
            user_agent: self.user_agent,
            last_activity: self.last_activity,
            data: self.data.0,
            flash_data: self.flash_data.0,
            version: self.version.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RememberRow {
    identity_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

impl RememberRow {
    fn into_entry(self) -> RememberEntry {
        RememberEntry {
            identity_id: IdentityId::from_uuid(self.identity_id),
            token: self.token,
            expires_at: self.expires_at,
            issued_at: self.issued_at,
        }
    }
}
