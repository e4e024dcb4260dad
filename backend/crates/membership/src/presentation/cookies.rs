//! Cookie rendering
//!
//! Turns the core's [`CookieDirective`]s into `Set-Cookie` headers and reads
//! the two membership cookies back off a request.

use std::net::IpAddr;

use axum::http::{HeaderMap, header};
use platform::client::extract_binding;
use platform::cookie::{CookieConfig, extract_cookie, to_header_value};

use crate::application::config::MembershipConfig;
use crate::application::orchestrator::RequestCredentials;
use crate::domain::value_object::cookie_directive::{CookieDirective, CookieKind};

fn cookie_config(config: &MembershipConfig, kind: CookieKind) -> &CookieConfig {
    match kind {
        CookieKind::Session => &config.session_cookie,
        CookieKind::Remember => &config.remember_cookie,
    }
}

/// `Set-Cookie` value for one directive
pub fn render(config: &MembershipConfig, directive: &CookieDirective) -> String {
    match directive {
        CookieDirective::Set {
            kind,
            value,
            max_age_secs,
        } => cookie_config(config, *kind).build_set_cookie(value, *max_age_secs),
        CookieDirective::Clear { kind } => cookie_config(config, *kind).build_delete_cookie(),
    }
}

/// Append one `Set-Cookie` header per directive
pub fn append_set_cookies(
    headers: &mut HeaderMap,
    config: &MembershipConfig,
    directives: impl IntoIterator<Item = CookieDirective>,
) {
    for directive in directives {
        match to_header_value(&render(config, &directive)) {
            Some(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            None => {
                tracing::error!(cookie = ?directive.kind(), "Cookie value is not a valid header");
            }
        }
    }
}

/// Cookies and client binding of an inbound request
pub fn request_credentials(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    config: &MembershipConfig,
) -> RequestCredentials {
    RequestCredentials {
        session_cookie: extract_cookie(headers, &config.session_cookie.name),
        remember_cookie: extract_cookie(headers, &config.remember_cookie.name),
        binding: extract_binding(headers, direct_ip, config.trust_forwarded_for),
    }
}
