//! Session Entry Entity
//!
//! Server-side record keyed by an opaque id. The cookie carries only the id.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use platform::client::ClientBinding;

/// Values stored in a session
pub type SessionValues = HashMap<String, serde_json::Value>;

/// Session entry
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    /// Opaque token; also the lookup key
    pub id: String,
    pub remote_addr: String,
    /// Truncated on creation
    pub user_agent: String,
    pub last_activity: DateTime<Utc>,
    pub data: SessionValues,
    /// Read-once values
    pub flash_data: SessionValues,
    /// Optimistic concurrency token; bumped on every stored write
    pub version: u64,
}

impl SessionEntry {
    pub fn new(id: String, binding: &ClientBinding, now: DateTime<Utc>) -> Self {
        Self {
            id,
            remote_addr: binding.remote_addr.clone(),
            user_agent: binding.user_agent.clone(),
            last_activity: now,
            data: SessionValues::new(),
            flash_data: SessionValues::new(),
            version: 0,
        }
    }

    /// Idle longer than `ttl`
    pub fn is_idle(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_activity) > ttl
    }

    /// Binding check; each half only applies when its toggle is on
    pub fn binding_matches(
        &self,
        binding: &ClientBinding,
        match_remote_addr: bool,
        match_user_agent: bool,
    ) -> bool {
        if match_remote_addr && self.remote_addr != binding.remote_addr {
            return false;
        }
        if match_user_agent && self.user_agent != binding.user_agent {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(now: DateTime<Utc>) -> SessionEntry {
        SessionEntry::new(
            "abc".to_string(),
            &ClientBinding::new("10.0.0.1", "UA-A"),
            now,
        )
    }

    #[test]
    fn test_binding_toggles() {
        let entry = entry(Utc::now());
        let other_ua = ClientBinding::new("10.0.0.1", "UA-B");
        let other_addr = ClientBinding::new("10.0.0.2", "UA-A");

        assert!(entry.binding_matches(&other_ua, true, false));
        assert!(!entry.binding_matches(&other_ua, false, true));
        assert!(!entry.binding_matches(&other_addr, true, false));
        assert!(entry.binding_matches(&other_addr, false, true));
        // Both off: portable
        assert!(entry.binding_matches(&ClientBinding::new("1.1.1.1", "x"), false, false));
    }

    #[test]
    fn test_idle_boundary() {
        let now = Utc::now();
        let entry = entry(now);
        let ttl = TimeDelta::seconds(7200);
        assert!(!entry.is_idle(ttl, now + ttl));
        assert!(entry.is_idle(ttl, now + ttl + TimeDelta::seconds(1)));
    }
}
