//! Shared authentication session
//!
//! One `AuthSession` per process owns the credential slot, the gate, and
//! the pending browser login. Handlers receive it through axum state;
//! tests construct isolated sessions pointed at mock servers.

use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use common::Secret;
use iracing_auth::{Credential, Endpoints, OAuthSettings};

use crate::error::{Error, Result};
use crate::gate::{self, GateAction, GateEvent, GateState, ReauthPolicy, RejectReason};

/// Email/password pair for the automatic re-login path.
#[derive(Debug, Clone)]
pub struct PasswordLogin {
    pub email: String,
    pub password: Secret<String>,
}

/// An in-progress browser login: the verifier waiting for its callback.
struct PendingLogin {
    verifier: String,
    created_at: Instant,
}

/// Maximum age of a pending login before its callback is refused.
const PENDING_LOGIN_EXPIRY: Duration = Duration::from_secs(600);

/// Outcome of the gate check for one gated request.
#[derive(Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied(RejectReason),
}

/// Process-wide authentication state.
///
/// The gate mutex is held across the login await inside [`authorize`], which
/// is what keeps concurrent requests from issuing duplicate login traffic.
/// The credential slot is swapped whole under its own lock and never mutated
/// in place.
///
/// [`authorize`]: AuthSession::authorize
pub struct AuthSession {
    client: reqwest::Client,
    endpoints: Endpoints,
    password: Option<PasswordLogin>,
    oauth: Option<OAuthSettings>,
    policy: ReauthPolicy,
    credential: RwLock<Option<Credential>>,
    gate: Mutex<GateState>,
    pending_login: Mutex<Option<PendingLogin>>,
}

impl AuthSession {
    pub fn new(
        client: reqwest::Client,
        endpoints: Endpoints,
        password: Option<PasswordLogin>,
        oauth: Option<OAuthSettings>,
        policy: ReauthPolicy,
    ) -> Self {
        Self {
            client,
            endpoints,
            password,
            oauth,
            policy,
            credential: RwLock::new(None),
            gate: Mutex::new(GateState::Authenticated),
            pending_login: Mutex::new(None),
        }
    }

    /// Members-API targets this session was built with.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Clone of the current credential, if one is held.
    pub async fn current_credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    /// Current gate state (for logs and tests).
    pub async fn gate_state(&self) -> GateState {
        *self.gate.lock().await
    }

    /// Probe the current credential without touching the gate.
    ///
    /// Used by the profile route, which reports credential validity instead
    /// of recovering from its absence.
    pub async fn verify_current(&self) -> bool {
        match self.current_credential().await {
            Some(credential) => {
                iracing_auth::verify(&self.client, &self.endpoints, &credential).await
            }
            None => false,
        }
    }

    /// Run the password login once and install the result.
    ///
    /// Called at startup in password deployments. Errors are the caller's to
    /// log; the relay keeps serving either way.
    pub async fn login_now(&self) -> Result<()> {
        let credential = self.password_login().await?;
        self.install_credential(credential).await;
        Ok(())
    }

    /// Replace the credential whole and reset the gate.
    pub async fn install_credential(&self, credential: Credential) {
        let kind = credential.kind();
        *self.credential.write().await = Some(credential);

        let mut gate = self.gate.lock().await;
        let (next, _) = gate::advance(
            *gate,
            GateEvent::CredentialInstalled,
            Instant::now(),
            &self.policy,
        );
        *gate = next;
        info!(kind, "credential installed");
    }

    /// Gate check for one gated request.
    ///
    /// Probes the current credential, advances the gate, and runs at most
    /// one re-login attempt. The attempt's outcome does not change this
    /// request's decision; the next request's probe confirms it.
    pub async fn authorize(&self) -> AccessDecision {
        {
            let gate = self.gate.lock().await;
            if *gate == GateState::Locked {
                metrics::counter!("relay_gate_rejections_total", "reason" => "locked")
                    .increment(1);
                return AccessDecision::Denied(RejectReason::Locked);
            }
        }

        let verified = match self.current_credential().await {
            Some(credential) => {
                iracing_auth::verify(&self.client, &self.endpoints, &credential).await
            }
            None => false,
        };

        let mut gate = self.gate.lock().await;
        let event = if verified {
            GateEvent::VerifyPassed
        } else {
            GateEvent::VerifyFailed
        };
        let before = gate.label();
        let (next, action) = gate::advance(*gate, event, Instant::now(), &self.policy);
        *gate = next;
        if before != next.label() {
            info!(from = before, to = next.label(), "gate transition");
        }

        match action {
            GateAction::Proceed => AccessDecision::Granted,
            GateAction::Reject(reason) => {
                warn!(
                    reason = reason.label(),
                    "request rejected by re-authentication gate"
                );
                metrics::counter!("relay_gate_rejections_total", "reason" => reason.label())
                    .increment(1);
                AccessDecision::Denied(reason)
            }
            GateAction::Reauthenticate => {
                // The gate lock is still held here, so concurrent requests
                // queue behind this single login instead of issuing their own.
                match self.password_login().await {
                    Ok(credential) => {
                        *self.credential.write().await = Some(credential);
                        metrics::counter!("relay_reauth_attempts_total", "outcome" => "succeeded")
                            .increment(1);
                        info!("re-login succeeded, next probe confirms");
                    }
                    Err(e) => {
                        metrics::counter!("relay_reauth_attempts_total", "outcome" => "failed")
                            .increment(1);
                        warn!(error = %e, "re-login attempt failed");
                    }
                }
                AccessDecision::Granted
            }
        }
    }

    /// Start a browser login: generate a PKCE pair, stash the verifier, and
    /// return the authorization URL to redirect to.
    ///
    /// Replaces any pending login, so one flight is in progress at a time.
    pub async fn begin_login(&self) -> Result<String> {
        let oauth = self.oauth.as_ref().ok_or(Error::OAuthNotConfigured)?;

        let verifier = iracing_auth::generate_verifier();
        let challenge = iracing_auth::compute_challenge(&verifier);
        let url = iracing_auth::build_authorization_url(oauth, &challenge);

        let mut pending = self.pending_login.lock().await;
        if pending.is_some() {
            debug!("replacing pending login");
        }
        *pending = Some(PendingLogin {
            verifier,
            created_at: Instant::now(),
        });

        info!("browser login initiated");
        Ok(url)
    }

    /// Finish a browser login: consume the pending verifier, exchange the
    /// code, and install the bearer credential. Returns the access token
    /// for the callback response body.
    pub async fn complete_login(&self, code: &str) -> Result<String> {
        let oauth = self.oauth.as_ref().ok_or(Error::OAuthNotConfigured)?;

        let pending = self
            .pending_login
            .lock()
            .await
            .take()
            .ok_or(Error::NoPendingLogin)?;
        if pending.created_at.elapsed() > PENDING_LOGIN_EXPIRY {
            return Err(Error::LoginExpired);
        }

        let token =
            iracing_auth::exchange_code(&self.client, oauth, code, &pending.verifier).await?;
        let access_token = token.access_token.clone();
        self.install_credential(token.into()).await;
        Ok(access_token)
    }

    async fn password_login(&self) -> Result<Credential> {
        let login = self
            .password
            .as_ref()
            .ok_or(Error::PasswordLoginUnavailable)?;
        let credential = iracing_auth::login_with_password(
            &self.client,
            &self.endpoints,
            &login.email,
            login.password.expose(),
        )
        .await?;
        Ok(credential)
    }
}
