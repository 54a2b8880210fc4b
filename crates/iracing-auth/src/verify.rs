//! Credential verification probe
//!
//! A cheap authenticated GET that answers "is this credential still
//! accepted upstream?". Session cookies probe the documentation index on
//! the members API; bearer tokens probe the OAuth profile endpoint. The
//! probe never errors: anything short of a 200 means "not valid right
//! now", and the re-authentication gate decides what to do about it.

use tracing::debug;

use crate::credentials::Credential;
use crate::endpoints::Endpoints;

/// Path probed with session-cookie credentials, relative to the members base.
const DOC_PROBE_PATH: &str = "/data/doc";

/// Check whether the credential is still accepted by the provider.
///
/// True iff the probe answers exactly 200; transport failures and every
/// other status are false.
pub async fn verify(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    credential: &Credential,
) -> bool {
    let url = match credential {
        Credential::SessionCookie { .. } => {
            format!("{}{}", endpoints.members_base, DOC_PROBE_PATH)
        }
        Credential::OAuthToken { .. } => endpoints.profile_url.clone(),
    };

    match credential.apply_to(client.get(&url)).send().await {
        Ok(response) => {
            let status = response.status();
            if status != reqwest::StatusCode::OK {
                debug!(kind = credential.kind(), %status, "verification probe refused");
            }
            status == reqwest::StatusCode::OK
        }
        Err(e) => {
            debug!(kind = credential.kind(), error = %e, "verification probe failed");
            false
        }
    }
}
