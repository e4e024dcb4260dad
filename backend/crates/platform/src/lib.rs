//! Platform Crate - technical building blocks for the membership core
//!
//! - Token generation from the OS CSPRNG (`crypto`)
//! - Secret normalization, policy and pluggable digests (`password`)
//! - Cookie attributes and `Set-Cookie` rendering (`cookie`)
//! - Client binding (remote address / user agent) extraction (`client`)

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod password;
