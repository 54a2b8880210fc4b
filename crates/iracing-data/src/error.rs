use thiserror::Error;

/// Failures while querying the members data API.
///
/// Unlike the credential probe, lookups report their failures: the caller
/// turns these into a 500 with details rather than a silent not-found.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("members API returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
