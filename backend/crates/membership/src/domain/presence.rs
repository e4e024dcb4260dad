//! Online Presence
//!
//! Derived, never stored: an identity is online while its last activity is
//! within the configured threshold.

use chrono::{DateTime, TimeDelta, Utc};

/// `now - last_activity <= threshold`
pub fn is_online(last_activity: DateTime<Utc>, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(last_activity) <= threshold
}

/// Earliest activity that still counts as online
pub fn online_since(threshold: TimeDelta, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(threshold)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let now = Utc::now();
        let threshold = TimeDelta::seconds(900);

        assert!(is_online(now - threshold, threshold, now));
        assert!(!is_online(
            now - threshold - TimeDelta::seconds(1),
            threshold,
            now
        ));
        assert!(is_online(now, threshold, now));
    }

    #[test]
    fn test_online_since_agrees_with_predicate() {
        let now = Utc::now();
        let threshold = TimeDelta::seconds(900);
        let since = online_since(threshold, now);
        assert!(is_online(since, threshold, now));
        assert!(!is_online(since - TimeDelta::seconds(1), threshold, now));
    }

    #[test]
    fn test_huge_threshold_does_not_overflow() {
        let now = Utc::now();
        assert_eq!(online_since(TimeDelta::MAX, now), DateTime::<Utc>::MIN_UTC);
    }
}
