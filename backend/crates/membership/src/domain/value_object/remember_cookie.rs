//! Remember-Me Cookie Value
//!
//! Encoded as `<len(id)>.<id><token>`. The decimal length prefix makes the
//! split unambiguous whatever characters the id or token contain.

use std::fmt;

use kernel::id::IdentityId;

use crate::error::{MembershipError, MembershipResult};

/// Upper bound on accepted cookie length
const MAX_COOKIE_LEN: usize = 1024;

#[derive(Clone, PartialEq, Eq)]
pub struct RememberCookie {
    pub identity_id: IdentityId,
    pub token: String,
}

impl RememberCookie {
    pub fn new(identity_id: IdentityId, token: impl Into<String>) -> Self {
        Self {
            identity_id,
            token: token.into(),
        }
    }

    pub fn encode(&self) -> String {
        let id = self.identity_id.to_string();
        format!("{}.{}{}", id.len(), id, self.token)
    }

    /// Parse a presented cookie; any malformation is `InvalidId`
    pub fn parse(value: &str) -> MembershipResult<Self> {
        if value.len() > MAX_COOKIE_LEN {
            return Err(MembershipError::InvalidId);
        }

        let (len, rest) = value.split_once('.').ok_or(MembershipError::InvalidId)?;
        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MembershipError::InvalidId);
        }
        let len: usize = len.parse().map_err(|_| MembershipError::InvalidId)?;

        let id = rest.get(..len).ok_or(MembershipError::InvalidId)?;
        let token = rest.get(len..).ok_or(MembershipError::InvalidId)?;
        if token.is_empty() {
            return Err(MembershipError::InvalidId);
        }

        Ok(Self {
            identity_id: IdentityId::parse(id)?,
            token: token.to_string(),
        })
    }
}

impl fmt::Debug for RememberCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RememberCookie")
            .field("identity_id", &self.identity_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
