//! iRacing endpoint defaults
//!
//! Production targets for the members API and the OAuth authorization
//! server. None of these are secrets; the account password and any issued
//! tokens are the secrets, and those live only in memory.

/// Base URL of the members API (login, verification probe, data lookups)
pub const MEMBERS_BASE_URL: &str = "https://members-ng.iracing.com";

/// Authorization endpoint for the browser PKCE flow
pub const AUTHORIZE_ENDPOINT: &str = "https://oauth.iracing.com/oauth2/authorize";

/// Token endpoint for the authorization-code exchange
pub const TOKEN_ENDPOINT: &str = "https://oauth.iracing.com/oauth2/token";

/// Profile endpoint probed to verify bearer credentials
pub const PROFILE_ENDPOINT: &str = "https://oauth.iracing.com/oauth2/iracing/profile";

/// Scope requested during the PKCE flow
pub const SCOPES: &str = "iracing.auth";

/// User-Agent sent on bearer-authenticated calls. iRacing asks OAuth
/// clients to identify themselves with a stable product string.
pub const RELAY_USER_AGENT: &str = "speedtrap-member-relay/0.1";
