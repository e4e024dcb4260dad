//! Client identification utilities
//!
//! A [`ClientBinding`] is what a session is bound to at creation: the remote
//! address and the (truncated) user agent of the client.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Stored user agents are cut to this many characters
pub const USER_AGENT_MAX_LEN: usize = 120;

/// Remote address and user agent of the requesting client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientBinding {
    pub remote_addr: String,
    pub user_agent: String,
}

impl ClientBinding {
    pub fn new(remote_addr: impl Into<String>, user_agent: &str) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            user_agent: truncate_user_agent(user_agent),
        }
    }
}

/// Truncate on a character boundary
pub fn truncate_user_agent(user_agent: &str) -> String {
    user_agent.chars().take(USER_AGENT_MAX_LEN).collect()
}

/// Build the binding for a request
///
/// A missing User-Agent binds to the empty string; an unknown address binds
/// to the empty string as well.
pub fn extract_binding(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded: bool,
) -> ClientBinding {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let remote_addr = extract_client_ip(headers, direct_ip, trust_forwarded)
        .map(|ip| ip.to_string())
        .unwrap_or_default();

    ClientBinding::new(remote_addr, user_agent)
}

/// Extract client IP address from headers
///
/// X-Forwarded-For is client-controlled; it is only honored behind a
/// reverse proxy that overwrites it (`trust_forwarded`).
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded: bool,
) -> Option<IpAddr> {
    if trust_forwarded {
        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
        {
            return Some(ip);
        }
    }
    direct_ip
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_binding() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 Test Browser"),
        );
        let direct: IpAddr = "10.1.2.3".parse().unwrap();

        let binding = extract_binding(&headers, Some(direct), false);
        assert_eq!(binding.remote_addr, "10.1.2.3");
        assert_eq!(binding.user_agent, "Mozilla/5.0 Test Browser");
    }

    #[test]
    fn test_missing_user_agent_is_empty() {
        let binding = extract_binding(&HeaderMap::new(), None, false);
        assert_eq!(binding, ClientBinding::default());
    }

    #[test]
    fn test_user_agent_truncation() {
        let long = "é".repeat(200);
        let binding = ClientBinding::new("127.0.0.1", &long);
        assert_eq!(binding.user_agent.chars().count(), USER_AGENT_MAX_LEN);

        let short = ClientBinding::new("127.0.0.1", "UA-A");
        assert_eq!(short.user_agent, "UA-A");
    }

    #[test]
    fn test_extract_client_ip_xff() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(direct), true),
            Some("192.168.1.1".parse().unwrap())
        );
        // Untrusted: forwarded header ignored
        assert_eq!(extract_client_ip(&headers, Some(direct), false), Some(direct));
    }

    #[test]
    fn test_extract_client_ip_direct() {
        let headers = HeaderMap::new();
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        let ip = extract_client_ip(&headers, Some(direct), true);
        assert_eq!(ip, Some(direct));
    }
}
