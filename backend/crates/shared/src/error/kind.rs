//! Error Kind - classification of failures
//!
//! Every crate-specific error maps onto one [`ErrorKind`]. The kind decides
//! the HTTP status and whether the condition is the caller's to fix.

use serde::Serialize;

/// Error classification shared across the workspace
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Conflict;
/// assert_eq!(kind.status_code(), 409);
/// assert!(kind.is_user_correctable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - malformed email, secret or id
    Validation,
    /// 401 - not logged in (includes revoked or replayed tokens)
    Unauthorized,
    /// 403 - authenticated but not allowed (e.g. awaiting approval)
    Forbidden,
    /// 404 - identity, session or remember entry absent
    NotFound,
    /// 409 - duplicate identity or a lost concurrent update
    Conflict,
    /// 500 - bug or broken invariant
    Internal,
    /// 503 - store timeout or connection failure
    Unavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Reason phrase used as the problem title
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Internal => "Internal Server Error",
            ErrorKind::Unavailable => "Service Unavailable",
        }
    }

    /// Transient failures worth retrying later
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }

    /// Conditions whose message is shown to the user verbatim
    #[inline]
    pub const fn is_user_correctable(&self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::Conflict)
    }

    /// 5xx kinds; these are logged at error level
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
