//! Membership - Authentication & Session Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, presence rule, repository traits
//! - `application/` - Credential manager, session store adapter, remember-me
//!   manager, presence tracker and the orchestrator composing them
//! - `infra/` - In-memory and PostgreSQL stores
//! - `presentation/` - axum adapter (cookies, middleware, handlers, router)
//!
//! ## Request flow
//! 1. [`Membership::begin`] loads (or synthesizes) the session
//! 2. [`Membership::resolve_current_user`] checks the remember-me cookie,
//!    then the session login stamp, else the caller is anonymous
//! 3. The caller emits the collected [`CookieDirective`]s
//!
//! ## Security Model
//! - Salted secrets behind a pluggable digest, compared in constant time
//! - Remember-me tokens rotate on every use; a replayed token revokes the entry
//! - Sessions optionally bound to remote address and user agent
//! - Store calls are time-bounded; read paths degrade to anonymous

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::MembershipConfig;
pub use application::orchestrator::{
    AuthState, CredentialCheck, Membership, RegisterOptions, RequestContext, RequestCredentials,
};
pub use domain::value_object::cookie_directive::{CookieDirective, CookieKind};
pub use error::{MembershipError, MembershipResult};
pub use infra::memory::MemoryStore;
pub use infra::postgres::PgMembershipStore;
pub use presentation::router::{membership_router, membership_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
