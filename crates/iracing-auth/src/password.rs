//! Password-hash login flow
//!
//! The members site accepts a pre-hashed password: base64 of
//! SHA-256(password + lowercased email). A successful `/auth` response sets
//! the session cookies that every subsequent members-API call presents.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::SET_COOKIE;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::credentials::{CookieJar, Credential};
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};

/// Compute the login hash: `base64(SHA256(password + lowercase(email)))`.
///
/// The email is lowercased before hashing, so the digest does not depend on
/// the casing the account holder typed their address in.
pub fn hash_password(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(email.to_lowercase().as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Log in with email and password, returning a session-cookie credential.
///
/// Non-2xx statuses are transport failures; beyond that the status line is
/// not inspected, cookie presence decides success.
pub async fn login_with_password(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    email: &str,
    password: &str,
) -> Result<Credential> {
    let hashed = hash_password(email, password);

    let response = client
        .post(format!("{}/auth", endpoints.members_base))
        .json(&serde_json::json!({ "email": email, "password": hashed }))
        .send()
        .await
        .map_err(|e| Error::TransportError(format!("login request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::TransportError(format!("login request failed: {e}")))?;

    let set_cookies: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect();

    let jar = CookieJar::from_set_cookie_values(&set_cookies);
    if jar.is_empty() {
        return Err(Error::NoCookiesReturned);
    }

    debug!(cookies = jar.len(), "session login succeeded");
    Ok(Credential::SessionCookie { jar })
}
