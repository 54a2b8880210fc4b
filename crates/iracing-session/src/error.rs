//! Error types for session operations

/// Errors from login orchestration.
///
/// Gate rejections are not errors, they are decisions, returned as
/// [`crate::session::AccessDecision`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no password credentials configured for automatic re-login")]
    PasswordLoginUnavailable,

    #[error("OAuth login flow is not configured")]
    OAuthNotConfigured,

    #[error("no login flow in progress")]
    NoPendingLogin,

    #[error("pending login expired, start a new one")]
    LoginExpired,

    #[error(transparent)]
    Auth(#[from] iracing_auth::Error),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
