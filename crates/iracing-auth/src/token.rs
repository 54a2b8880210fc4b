//! OAuth token exchange
//!
//! Completes the PKCE flow: the browser came back with an authorization
//! code, and we trade it plus the stored verifier for a bearer token at the
//! token endpoint. The relay does not run a refresh loop; a credential
//! that stops verifying is replaced by a fresh login instead.

use serde::Deserialize;

use crate::credentials::Credential;
use crate::endpoints::OAuthSettings;
use crate::error::{Error, Result};

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time. iRacing's
/// endpoint omits the refresh token for public PKCE clients, so both
/// metadata fields are optional.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl From<TokenResponse> for Credential {
    fn from(token: TokenResponse) -> Self {
        Credential::OAuthToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        }
    }
}

/// Exchange an authorization code for a bearer token.
///
/// Second step of the PKCE flow: the verifier proves this relay initiated
/// the authorization the code belongs to.
pub async fn exchange_code(
    client: &reqwest::Client,
    oauth: &OAuthSettings,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::TransportError(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::ExchangeFailed(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::ExchangeFailed(format!("invalid token response: {e}")))
}
