//! Value Objects

pub mod cookie_directive;
pub mod email;
pub mod login_stamp;
pub mod profile;
pub mod remember_cookie;
