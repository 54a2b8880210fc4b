//! In-memory credential model
//!
//! A process holds at most one active credential: the cookie jar from a
//! password login or the bearer token from the PKCE flow. Re-authentication
//! replaces the whole value rather than mutating it, and nothing is ever
//! written to disk, so a restart starts from scratch.

use reqwest::header::{COOKIE, USER_AGENT};

use crate::constants::RELAY_USER_AGENT;

/// Cookie name/value pairs collected from login `Set-Cookie` headers,
/// kept in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    /// Build a jar from raw `Set-Cookie` header values.
    ///
    /// Only the leading `name=value` pair of each header is kept; the
    /// attributes after the first `;` (Path, Secure, Expires, ...) don't
    /// matter for a single-origin jar and are dropped.
    pub fn from_set_cookie_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cookies = Vec::new();
        for value in values {
            let pair = value.as_ref().split(';').next().unwrap_or_default();
            if let Some((name, val)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.push((name.to_string(), val.trim().to_string()));
                }
            }
        }
        Self { cookies }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Render the `Cookie` request-header value: `name1=value1; name2=value2`.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The authenticated proof presented on calls to the members API.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Session cookies from the password-hash login flow
    SessionCookie { jar: CookieJar },
    /// Bearer token from the OAuth PKCE flow
    OAuthToken {
        access_token: String,
        refresh_token: Option<String>,
        /// Seconds-until-expiry as reported by the token endpoint
        expires_in: Option<u64>,
    },
}

impl Credential {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::SessionCookie { .. } => "session_cookie",
            Credential::OAuthToken { .. } => "oauth_token",
        }
    }

    /// Attach this credential to an outbound request: the rendered cookie
    /// string for session credentials, or a bearer header plus the relay
    /// user-agent for OAuth credentials.
    pub fn apply_to(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::SessionCookie { jar } => request.header(COOKIE, jar.header_value()),
            Credential::OAuthToken { access_token, .. } => request
                .bearer_auth(access_token)
                .header(USER_AGENT, RELAY_USER_AGENT),
        }
    }
}
