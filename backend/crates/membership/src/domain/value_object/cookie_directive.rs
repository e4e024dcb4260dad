//! Cookie Directives
//!
//! The core never writes headers. It returns what should happen to each of
//! its two cookies and the web layer renders `Set-Cookie`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookieKind {
    /// Opaque session store key
    Session,
    /// Length-prefixed identity id + rotating token
    Remember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// `max_age_secs = None` is a browser-session cookie
    Set {
        kind: CookieKind,
        value: String,
        max_age_secs: Option<i64>,
    },
    Clear {
        kind: CookieKind,
    },
}

impl CookieDirective {
    pub fn kind(&self) -> CookieKind {
        match self {
            CookieDirective::Set { kind, .. } | CookieDirective::Clear { kind } => *kind,
        }
    }
}
