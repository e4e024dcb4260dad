//! Membership Error Types
//!
//! Membership-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::EntropyError;
use platform::password::SecretPolicyError;
use thiserror::Error;

/// Membership-specific result type alias
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Membership-specific error variants
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Email failed the format check
    #[error("Invalid email address: {0}")]
    InvalidEmail(&'static str),

    /// Secret failed the policy check
    #[error("{0}")]
    InvalidSecret(#[from] SecretPolicyError),

    /// Profile field failed validation
    #[error("Invalid profile: {0}")]
    InvalidProfile(&'static str),

    /// Malformed identity id or remember-me cookie
    #[error("Malformed identifier")]
    InvalidId,

    /// Unknown email or wrong secret; deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Correct secret, identity not yet approved
    #[error("Account is awaiting approval")]
    NotApproved,

    /// No session or remember-me login on the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Identity, session or remember entry absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Email (or id) already registered
    #[error("Email is already registered")]
    DuplicateIdentity,

    /// Key clash on a non-identity record
    #[error("Duplicate key in {0}")]
    DuplicateKey(&'static str),

    /// Store did not answer in time
    #[error("Store unavailable during {operation}")]
    Unavailable { operation: &'static str },

    /// Conditional update kept losing to concurrent writers
    #[error("Concurrent update on {0}")]
    ConcurrentUpdate(&'static str),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// OS entropy source failed
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// Digest primitive failed its self-test
    #[error("Secret digest unavailable: {0}")]
    DigestUnavailable(String),

    /// Stored session value could not be (de)serialized
    #[error("Session value error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MembershipError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MembershipError::InvalidEmail(_)
            | MembershipError::InvalidSecret(_)
            | MembershipError::InvalidProfile(_)
            | MembershipError::InvalidId => ErrorKind::Validation,
            MembershipError::InvalidCredentials | MembershipError::Unauthenticated => {
                ErrorKind::Unauthorized
            }
            MembershipError::NotApproved => ErrorKind::Forbidden,
            MembershipError::NotFound(_) => ErrorKind::NotFound,
            MembershipError::DuplicateIdentity
            | MembershipError::DuplicateKey(_)
            | MembershipError::ConcurrentUpdate(_) => ErrorKind::Conflict,
            MembershipError::Unavailable { .. } => ErrorKind::Unavailable,
            MembershipError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    ErrorKind::Unavailable
                }
                _ => ErrorKind::Internal,
            },
            MembershipError::Entropy(_)
            | MembershipError::DigestUnavailable(_)
            | MembershipError::Serialization(_)
            | MembershipError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Store could not be reached (timeouts, pool exhaustion, I/O)
    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.to_string());
        match self {
            MembershipError::DuplicateIdentity => err.with_action("Sign in instead"),
            MembershipError::Unavailable { .. } => err.with_action("Try again later"),
            _ => err,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            MembershipError::Database(e) => {
                tracing::error!(error = %e, "Membership database error");
            }
            MembershipError::Entropy(e) => {
                tracing::error!(error = %e, "Entropy source failure");
            }
            MembershipError::DigestUnavailable(reason) => {
                tracing::error!(reason = %reason, "Secret digest unavailable");
            }
            MembershipError::Internal(msg) => {
                tracing::error!(message = %msg, "Membership internal error");
            }
            MembershipError::Unavailable { operation } => {
                tracing::warn!(operation, "Membership store unavailable");
            }
            MembershipError::ConcurrentUpdate(what) => {
                tracing::warn!(record = what, "Conditional update retries exhausted");
            }
            _ => {
                tracing::debug!(error = %self, "Membership error");
            }
        }
    }
}

impl IntoResponse for MembershipError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<MembershipError> for AppError {
    fn from(err: MembershipError) -> Self {
        err.to_app_error()
    }
}

impl From<kernel::id::IdParseError> for MembershipError {
    fn from(_: kernel::id::IdParseError) -> Self {
        MembershipError::InvalidId
    }
}
