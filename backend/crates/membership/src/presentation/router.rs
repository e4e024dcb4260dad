//! Membership Router

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::application::orchestrator::Membership;
use crate::domain::repository::{IdentityRepository, RememberRepository, SessionRepository};
use crate::infra::postgres::PgMembershipStore;
use crate::presentation::handlers::{self, MembershipAppState};
use crate::presentation::middleware::{current_user, require_user};

/// Create the membership router over the PostgreSQL store
pub fn membership_router(membership: Arc<Membership<PgMembershipStore>>) -> Router {
    membership_router_generic(membership)
}

/// Create a membership router for any store implementation
pub fn membership_router_generic<R>(membership: Arc<Membership<R>>) -> Router
where
    R: IdentityRepository + SessionRepository + RememberRepository + Send + Sync + 'static,
{
    let state = MembershipAppState { membership };

    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route("/online", get(handlers::online::<R>))
        .route("/profile", put(handlers::update_profile::<R>))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .route("/register", post(handlers::register::<R>))
        .route("/login", post(handlers::login::<R>))
        .route("/logout", post(handlers::logout::<R>))
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), current_user::<R>))
        .with_state(state)
}
