//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::identity::Identity;
use crate::domain::value_object::profile::Profile;

// ============================================================================
// Register
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile: ProfileRequest,
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nick_name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl From<ProfileRequest> for Profile {
    fn from(req: ProfileRequest) -> Self {
        Self {
            first_name: req.first_name,
            middle_name: req.middle_name,
            last_name: req.last_name,
            nick_name: req.nick_name,
            birthday: req.birthday,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nick_name: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub join_day: NaiveDate,
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub identity: IdentityResponse,
    pub remembered: bool,
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub approved: bool,
    pub profile: ProfileResponse,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.as_str().to_string(),
            approved: identity.approved,
            profile: ProfileResponse {
                first_name: identity.profile.first_name.clone(),
                middle_name: identity.profile.middle_name.clone(),
                last_name: identity.profile.last_name.clone(),
                nick_name: identity.profile.nick_name.clone(),
                birthday: identity.profile.birthday,
                join_day: identity.join_day,
            },
            last_activity: identity.last_activity,
            created_at: identity.created_at,
        }
    }
}

/// Current caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub identity: IdentityResponse,
    /// "session" or "remember"
    pub via: &'static str,
}

// ============================================================================
// Online
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineQuery {
    /// Last id of the previous page
    pub after: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineResponse {
    pub count: u64,
    pub identities: Vec<IdentityResponse>,
    /// Pass as `after` to fetch the next page
    pub next_after: Option<String>,
}
