//! Application Configuration
//!
//! Configuration for the membership core. Passed explicitly at construction.

use std::time::Duration;

use chrono::TimeDelta;
use platform::cookie::CookieConfig;
use thiserror::Error;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Default session data key holding the login stamp
pub const DEFAULT_LOGIN_KEY: &str = "membership.login";

/// Membership configuration
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Activity window for "online" and for session login stamps (15 minutes)
    pub online_threshold: Duration,
    /// Idle lifetime of a session entry (2 hours)
    pub session_ttl: Duration,
    /// Remember-me lifetime when the caller does not choose one (30 days)
    pub remember_default_duration: Duration,
    /// Bind sessions to the creating remote address
    pub match_remote_addr: bool,
    /// Bind sessions to the creating user agent
    pub match_user_agent: bool,
    /// Honor X-Forwarded-For when extracting the remote address
    pub trust_forwarded_for: bool,
    /// Minimum secret length in code points
    pub min_password_length: usize,
    /// Upper bound on every store call
    pub store_timeout: Duration,
    /// Grace added to remember-me expiry
    pub remember_clock_skew: Duration,
    /// Session data key holding the login stamp
    pub login_key: String,
    pub session_cookie: CookieConfig,
    pub remember_cookie: CookieConfig,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            online_threshold: Duration::from_secs(900),
            session_ttl: Duration::from_secs(7200),
            remember_default_duration: Duration::from_secs(30 * 24 * 3600),
            match_remote_addr: true,
            match_user_agent: false,
            trust_forwarded_for: false,
            min_password_length: platform::password::MIN_SECRET_LENGTH,
            store_timeout: Duration::from_secs(2),
            remember_clock_skew: Duration::ZERO,
            login_key: DEFAULT_LOGIN_KEY.to_string(),
            session_cookie: CookieConfig::named("sessionId"),
            remember_cookie: CookieConfig::named("rememberToken"),
        }
    }
}

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl MembershipConfig {
    /// Create config for development (insecure cookies)
    pub fn development() -> Self {
        let mut config = Self::default();
        config.session_cookie.secure = false;
        config.remember_cookie.secure = false;
        config
    }

    /// Read `MEMBERSHIP_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("MEMBERSHIP_ONLINE_THRESHOLD_SECS") {
            config.online_threshold = parse_secs("MEMBERSHIP_ONLINE_THRESHOLD_SECS", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_SESSION_TTL_SECS") {
            config.session_ttl = parse_secs("MEMBERSHIP_SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_REMEMBER_DURATION_SECS") {
            config.remember_default_duration =
                parse_secs("MEMBERSHIP_REMEMBER_DURATION_SECS", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_MATCH_REMOTE_ADDR") {
            config.match_remote_addr = parse_bool("MEMBERSHIP_MATCH_REMOTE_ADDR", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_MATCH_USER_AGENT") {
            config.match_user_agent = parse_bool("MEMBERSHIP_MATCH_USER_AGENT", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_TRUST_FORWARDED_FOR") {
            config.trust_forwarded_for = parse_bool("MEMBERSHIP_TRUST_FORWARDED_FOR", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_MIN_PASSWORD_LENGTH") {
            config.min_password_length = v.trim().parse().map_err(|_| ConfigError {
                key: "MEMBERSHIP_MIN_PASSWORD_LENGTH",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("MEMBERSHIP_STORE_TIMEOUT_MS") {
            let ms: u64 = v.trim().parse().map_err(|_| ConfigError {
                key: "MEMBERSHIP_STORE_TIMEOUT_MS",
                value: v.clone(),
            })?;
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("MEMBERSHIP_REMEMBER_CLOCK_SKEW_SECS") {
            config.remember_clock_skew = parse_secs("MEMBERSHIP_REMEMBER_CLOCK_SKEW_SECS", &v)?;
        }
        if let Some(v) = lookup("MEMBERSHIP_COOKIE_SECURE") {
            let secure = parse_bool("MEMBERSHIP_COOKIE_SECURE", &v)?;
            config.session_cookie.secure = secure;
            config.remember_cookie.secure = secure;
        }
        if let Some(v) = lookup("MEMBERSHIP_COOKIE_SAME_SITE") {
            let same_site = SameSite::parse(&v).ok_or_else(|| ConfigError {
                key: "MEMBERSHIP_COOKIE_SAME_SITE",
                value: v.clone(),
            })?;
            config.session_cookie.same_site = same_site;
            config.remember_cookie.same_site = same_site;
        }
        if let Some(v) = lookup("MEMBERSHIP_COOKIE_DOMAIN") {
            let domain = Some(v.trim().to_string()).filter(|d| !d.is_empty());
            config.session_cookie.domain = domain.clone();
            config.remember_cookie.domain = domain;
        }
        if let Some(v) = lookup("MEMBERSHIP_COOKIE_PATH") {
            config.session_cookie.path = v.clone();
            config.remember_cookie.path = v;
        }
        if let Some(v) = lookup("MEMBERSHIP_SESSION_COOKIE_NAME") {
            config.session_cookie.name = v;
        }
        if let Some(v) = lookup("MEMBERSHIP_REMEMBER_COOKIE_NAME") {
            config.remember_cookie.name = v;
        }

        Ok(config)
    }

    pub fn online_threshold_delta(&self) -> TimeDelta {
        to_delta(self.online_threshold)
    }

    pub fn session_ttl_delta(&self) -> TimeDelta {
        to_delta(self.session_ttl)
    }

    pub fn remember_clock_skew_delta(&self) -> TimeDelta {
        to_delta(self.remember_clock_skew)
    }
}

/// Saturating conversion; chrono's range is narrower than std's
pub(crate) fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError {
            key,
            value: value.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: value.to_string(),
        }),
    }
}
