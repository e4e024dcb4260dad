//! Notification collaborator
//!
//! Delivery (mail, queue, ...) is the implementor's business. A failed
//! notification is logged and never rolls back the change that caused it.

use std::fmt;

use crate::domain::entity::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    AccountAdded,
    PasswordChanged,
    AccountApproved,
    AccountInfoChanged,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::AccountAdded => "account_added",
            NotificationEvent::PasswordChanged => "password_changed",
            NotificationEvent::AccountApproved => "account_approved",
            NotificationEvent::AccountInfoChanged => "account_info_changed",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification failure; opaque to the core
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    async fn notify(&self, event: NotificationEvent, identity: &Identity) -> Result<(), NotifyError>;
}

/// Logs the event and delivers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    async fn notify(&self, event: NotificationEvent, identity: &Identity) -> Result<(), NotifyError> {
        tracing::info!(event = %event, identity_id = %identity.id, "Membership notification");
        Ok(())
    }
}
