//! Shared Kernel - vocabulary shared by every membership crate
//!
//! - Error taxonomy ([`error::kind::ErrorKind`]) and the unified [`error::app_error::AppError`]
//! - Typed identifiers ([`id::Id`])
//!
//! Nothing in here knows about sessions, tokens or credentials.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
