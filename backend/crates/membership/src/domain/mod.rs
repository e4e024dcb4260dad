//! Domain Layer
//!
//! Contains entities, value objects, the presence rule and repository traits.

pub mod entity;
pub mod presence;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    identity::{Credential, Identity},
    remember_entry::RememberEntry,
    session_entry::{SessionEntry, SessionValues},
};
pub use repository::{IdentityRepository, RememberRepository, SessionRepository};
