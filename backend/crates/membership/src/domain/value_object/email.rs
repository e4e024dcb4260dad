//! Email Value Object
//!
//! Trimmed and lower-cased on construction; the lower-cased form is the
//! unique lookup key.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{MembershipError, MembershipResult};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Maximum local part length (per RFC 5321)
const LOCAL_PART_MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl AsRef<str>) -> MembershipResult<Self> {
        let email = email.as_ref().trim().to_lowercase();

        if email.is_empty() {
            return Err(MembershipError::InvalidEmail("empty"));
        }
        if email.len() > EMAIL_MAX_LENGTH {
            return Err(MembershipError::InvalidEmail("too long"));
        }
        Self::check_format(&email)?;

        Ok(Self(email))
    }

    fn check_format(email: &str) -> MembershipResult<()> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(MembershipError::InvalidEmail("missing @"));
        };
        if domain.contains('@') {
            return Err(MembershipError::InvalidEmail("more than one @"));
        }

        if local.is_empty() || local.len() > LOCAL_PART_MAX_LENGTH {
            return Err(MembershipError::InvalidEmail("bad local part"));
        }
        if local.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(MembershipError::InvalidEmail("bad local part"));
        }

        let domain_ok = domain.contains('.')
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            && !domain.starts_with(['.', '-'])
            && !domain.ends_with(['.', '-'])
            && !domain.contains("..");
        if !domain_ok {
            return Err(MembershipError::InvalidEmail("bad domain"));
        }

        Ok(())
    }

    /// Create from a stored value (validated on the way in)
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_db(self) -> String {
        self.0
    }
}

impl FromStr for Email {
    type Err = MembershipError;

    fn from_str(s: &str) -> MembershipResult<Self> {
        Email::new(s)
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::new("alice@example.com").is_ok());
        assert!(Email::new("user.name@example.co.jp").is_ok());
        assert!(Email::new("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_invalid() {
        for bad in [
            "",
            "   ",
            "userexample.com",
            "user@",
            "@example.com",
            "user@@example.com",
            "user@example",
            "user@-example.com",
            "user@example..com",
            "us er@example.com",
        ] {
            assert!(
                matches!(Email::new(bad), Err(MembershipError::InvalidEmail(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_email_case_normalization() {
        let email = Email::new("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn test_email_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(Email::new(long).is_err());
    }
}
