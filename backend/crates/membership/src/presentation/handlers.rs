//! HTTP Handlers
//!
//! Every handler runs behind [`current_user`](super::middleware::current_user),
//! which supplies the [`AuthState`] and [`RequestHandle`] extensions and
//! writes the resulting cookies.

use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use kernel::id::IdentityId;
use platform::password::ClearTextSecret;

use crate::application::orchestrator::{AuthState, CredentialCheck, Membership, RegisterOptions};
use crate::application::presence::MAX_PAGE_SIZE;
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::error::{MembershipError, MembershipResult};
use crate::presentation::dto::{
    IdentityResponse, LoginRequest, LoginResponse, MeResponse, OnlineQuery, OnlineResponse,
    ProfileRequest, RegisterRequest,
};
use crate::presentation::middleware::RequestHandle;

/// Default page size for `/online`
const DEFAULT_PAGE_SIZE: usize = 50;

/// Shared state for membership handlers
pub struct MembershipAppState<R>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    pub membership: Arc<Membership<R>>,
}

impl<R> Clone for MembershipAppState<R>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            membership: self.membership.clone(),
        }
    }
}

// ============================================================================
// Register
// ============================================================================

/// POST /register
pub async fn register<R>(
    State(state): State<MembershipAppState<R>>,
    Json(req): Json<RegisterRequest>,
) -> MembershipResult<impl IntoResponse>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let secret = ClearTextSecret::new(req.password);
    let identity = state
        .membership
        .register_with_profile(
            &req.email,
            &secret,
            req.profile.into(),
            RegisterOptions::default(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(IdentityResponse::from(&identity))))
}

// ============================================================================
// Login
// ============================================================================

/// POST /login
pub async fn login<R>(
    State(state): State<MembershipAppState<R>>,
    Extension(handle): Extension<RequestHandle>,
    Json(req): Json<LoginRequest>,
) -> MembershipResult<Json<LoginResponse>>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let secret = ClearTextSecret::new(req.password);
    let check = match state.membership.validate_credentials(&req.email, &secret).await {
        Ok(check) => check,
        Err(MembershipError::NotFound(_)) => return Err(MembershipError::InvalidCredentials),
        Err(e) => return Err(e),
    };

    let identity = match check {
        CredentialCheck::Valid(identity) => identity,
        CredentialCheck::InvalidSecret => return Err(MembershipError::InvalidCredentials),
        CredentialCheck::NotApproved => return Err(MembershipError::NotApproved),
    };

    let remember_secs = if req.remember_me {
        i64::try_from(state.membership.config().remember_default_duration.as_secs())
            .unwrap_or(i64::MAX)
    } else {
        0
    };

    let mut ctx = handle.lock().await;
    state
        .membership
        .login(&mut ctx, &identity, remember_secs)
        .await?;

    Ok(Json(LoginResponse {
        identity: IdentityResponse::from(&identity),
        remembered: req.remember_me,
    }))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /logout
pub async fn logout<R>(
    State(state): State<MembershipAppState<R>>,
    Extension(handle): Extension<RequestHandle>,
) -> MembershipResult<StatusCode>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let mut ctx = handle.lock().await;
    state.membership.logout(&mut ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Current user
// ============================================================================

/// GET /me
pub async fn me(Extension(auth): Extension<AuthState>) -> MembershipResult<Json<MeResponse>> {
    let identity = auth.identity().ok_or(MembershipError::Unauthenticated)?;
    Ok(Json(MeResponse {
        identity: IdentityResponse::from(identity),
        via: auth.as_str(),
    }))
}

// ============================================================================
// Profile
// ============================================================================

/// PUT /profile
pub async fn update_profile<R>(
    State(state): State<MembershipAppState<R>>,
    Extension(auth): Extension<AuthState>,
    Json(req): Json<ProfileRequest>,
) -> MembershipResult<Json<IdentityResponse>>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let id = auth.identity().ok_or(MembershipError::Unauthenticated)?.id;
    let identity = state.membership.update_profile(id, req.into()).await?;
    Ok(Json(IdentityResponse::from(&identity)))
}

// ============================================================================
// Online
// ============================================================================

/// GET /online
pub async fn online<R>(
    State(state): State<MembershipAppState<R>>,
    Query(query): Query<OnlineQuery>,
) -> MembershipResult<Json<OnlineResponse>>
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let after = query.after.as_deref().map(IdentityId::parse).transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let count = state.membership.count_online().await?;
    let page = state.membership.list_online(after, limit).await?;

    let next_after = (page.len() == limit)
        .then(|| page.last().map(|identity| identity.id.to_string()))
        .flatten();

    Ok(Json(OnlineResponse {
        count,
        identities: page.iter().map(IdentityResponse::from).collect(),
        next_after,
    }))
}
