//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the browser
//! login flow. The verifier stays on the relay and is sent during token
//! exchange; the challenge rides along in the authorization URL so the
//! authorization server can check that the exchange request came from the
//! party that started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::endpoints::OAuthSettings;

/// Generate a cryptographically random PKCE code verifier.
///
/// 96 random bytes encode to exactly 128 URL-safe base64 characters with no
/// padding, the maximum verifier length RFC 7636 allows (43-128).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 96];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the authorization URL the end user's browser is redirected to.
///
/// One login flight at a time per process, so no `state` parameter is
/// carried; the code is bound to this relay by the PKCE verifier.
pub fn build_authorization_url(oauth: &OAuthSettings, challenge: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method=S256",
        oauth.authorize_url,
        oauth.client_id,
        urlencoded(&oauth.redirect_uri),
        urlencoded(&oauth.scope),
        challenge,
    )
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> OAuthSettings {
        OAuthSettings {
            client_id: "speedtrap-bets".into(),
            redirect_uri: "http://localhost:3001/callback".into(),
            authorize_url: "https://oauth.iracing.com/oauth2/authorize".into(),
            token_url: "https://oauth.iracing.com/oauth2/token".into(),
            scope: "iracing.auth".into(),
        }
    }

    #[test]
    fn verifier_is_exactly_128_url_safe_chars() {
        let verifier = generate_verifier();
        // 96 bytes → 96 * 4/3 = 128 base64url chars, no padding remainder
        assert_eq!(verifier.len(), 128);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier must be URL-safe base64 (no padding): {verifier}"
        );
    }

    #[test]
    fn verifiers_are_unique() {
        let a = generate_verifier();
        let b = generate_verifier();
        assert_ne!(a, b, "two verifiers must not collide");
    }

    #[test]
    fn challenge_is_deterministic() {
        let c1 = compute_challenge("test-verifier-value");
        let c2 = compute_challenge("test-verifier-value");
        assert_eq!(c1, c2, "same verifier must produce same challenge");
    }

    #[test]
    fn challenge_is_url_safe_base64() {
        let challenge = compute_challenge("test-verifier");
        // SHA-256 produces 32 bytes → 43 base64url chars (no padding)
        assert_eq!(challenge.len(), 43);
        assert!(
            !challenge.contains('+') && !challenge.contains('/') && !challenge.contains('='),
            "challenge must carry no standard-alphabet or padding characters: {challenge}"
        );
    }

    #[test]
    fn challenge_matches_known_value() {
        // Pre-computed: SHA256("hello") = 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
        // base64url of those 32 bytes = LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ
        let challenge = compute_challenge("hello");
        assert_eq!(challenge, "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ");
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let settings = test_settings();
        let challenge = compute_challenge("test-verifier");
        let url = build_authorization_url(&settings, &challenge);

        assert!(url.starts_with(&settings.authorize_url));
        assert!(url.contains("client_id=speedtrap-bets"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3001%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=iracing.auth"));
        assert!(url.contains(&format!("code_challenge={challenge}")));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn roundtrip_verifier_challenge() {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);

        let decoded = URL_SAFE_NO_PAD.decode(&challenge).expect("valid base64url");
        assert_eq!(decoded.len(), 32, "SHA-256 hash must be 32 bytes");
    }
}
