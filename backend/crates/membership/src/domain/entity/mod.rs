//! Domain Entities

pub mod identity;
pub mod remember_entry;
pub mod session_entry;
