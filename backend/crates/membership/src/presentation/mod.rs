//! Presentation Layer
//!
//! axum adapter: cookie rendering, middleware, handlers, DTOs and router.

pub mod cookies;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::MembershipAppState;
pub use middleware::{RequestHandle, current_user, require_user};
pub use router::{membership_router, membership_router_generic};
