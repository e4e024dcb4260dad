//! Infrastructure Layer
//!
//! Store implementations of the repository traits.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgMembershipStore;
