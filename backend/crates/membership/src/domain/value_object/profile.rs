//! Profile Value Object
//!
//! Optional personal details carried by an identity. Names are trimmed and
//! blank names are dropped; a birthday cannot lie in the future.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{MembershipError, MembershipResult};

/// Maximum length of any single name, in characters
const NAME_MAX_CHARS: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nick_name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl Profile {
    /// Validate against `today` and return the normalized profile
    pub fn normalized(self, today: NaiveDate) -> MembershipResult<Self> {
        if self.birthday.is_some_and(|birthday| birthday > today) {
            return Err(MembershipError::InvalidProfile("birthday is in the future"));
        }

        Ok(Self {
            first_name: clean_name(self.first_name)?,
            middle_name: clean_name(self.middle_name)?,
            last_name: clean_name(self.last_name)?,
            nick_name: clean_name(self.nick_name)?,
            birthday: self.birthday,
        })
    }

    /// "First Middle Last", skipping missing parts
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

fn clean_name(name: Option<String>) -> MembershipResult<Option<String>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(MembershipError::InvalidProfile("name too long"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(MembershipError::InvalidProfile("name contains control characters"));
    }
    Ok(Some(trimmed.to_string()))
}
