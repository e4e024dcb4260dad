//! Application Layer
//!
//! Managers composed by the [`orchestrator::Membership`] orchestrator.

pub mod clock;
pub mod config;
pub mod credentials;
pub mod notifier;
pub mod orchestrator;
pub mod presence;
pub mod remember;
pub mod sessions;
mod store_call;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MembershipConfig;
pub use credentials::{CredentialManager, DefaultFormatChecker, FormatChecker};
pub use notifier::{NotificationEvent, Notifier, TracingNotifier};
pub use orchestrator::{
    AuthState, CredentialCheck, Membership, RegisterOptions, RequestContext, RequestCredentials,
};
pub use presence::PresenceTracker;
pub use remember::{IssuedRemember, RememberManager, RememberResolution};
pub use sessions::{LoadOutcome, Session, SessionLoad, SessionStore};
