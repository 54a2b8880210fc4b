//! Caller-supplied endpoint settings
//!
//! Every network call in this crate takes its targets from these structs
//! rather than reading the constants directly, so deployments and tests can
//! point the relay at a different host.

use crate::constants;

/// Members-API targets used by login, verification, and lookups.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base URL of the members API, no trailing slash
    pub members_base: String,
    /// Absolute URL of the profile probe for bearer credentials
    pub profile_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            members_base: constants::MEMBERS_BASE_URL.to_string(),
            profile_url: constants::PROFILE_ENDPOINT.to_string(),
        }
    }
}

/// OAuth client settings for the PKCE flow.
///
/// `client_id` and `redirect_uri` are deployment-specific; the URL and
/// scope fields default to the production constants when the config file
/// leaves them out.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scope: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_point_at_production() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.members_base, constants::MEMBERS_BASE_URL);
        assert_eq!(endpoints.profile_url, constants::PROFILE_ENDPOINT);
    }
}
