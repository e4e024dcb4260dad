//! Membership Middleware
//!
//! Resolves the caller once per request. Downstream handlers find the
//! [`AuthState`] and a [`RequestHandle`] in the request extensions; the
//! collected cookie directives are rendered onto the response afterwards.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::application::orchestrator::{AuthState, RequestContext};
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::domain::value_object::cookie_directive::CookieDirective;
use crate::presentation::cookies::{append_set_cookies, request_credentials};
use crate::presentation::handlers::MembershipAppState;

/// Shared handle on the per-request [`RequestContext`]
#[derive(Clone, Debug)]
pub struct RequestHandle(Arc<Mutex<RequestContext>>);

impl RequestHandle {
    pub fn new(ctx: RequestContext) -> Self {
        Self(Arc::new(Mutex::new(ctx)))
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, RequestContext> {
        self.0.lock().await
    }

    async fn cookie_directives(&self) -> Vec<CookieDirective> {
        self.0.lock().await.cookie_directives()
    }
}

/// Resolve the current user and insert [`AuthState`] + [`RequestHandle`]
pub async fn current_user<R>(
    State(state): State<MembershipAppState<R>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let config = state.membership.config();
    let presented = request_credentials(req.headers(), direct_ip, config);

    let mut ctx = match state.membership.begin(presented).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };
    let auth = state.membership.resolve_current_user(&mut ctx).await;
    tracing::debug!(auth = auth.as_str(), "Request resolved");

    let handle = RequestHandle::new(ctx);
    req.extensions_mut().insert(auth);
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;
    append_set_cookies(
        response.headers_mut(),
        state.membership.config(),
        handle.cookie_directives().await,
    );
    response
}

/// Reject anonymous callers; must run inside [`current_user`]
pub async fn require_user(req: Request<Body>, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<AuthState>()
        .is_some_and(AuthState::is_authenticated);

    if !authenticated {
        return (StatusCode::UNAUTHORIZED, [("X-Auth-Required", "true")]).into_response();
    }

    next.run(req).await
}
