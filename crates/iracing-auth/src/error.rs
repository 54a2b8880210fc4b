//! Error types for authentication operations

/// Errors from login and token-exchange operations.
///
/// Verification is deliberately absent here: a failed probe is a state
/// transition for the session layer, not an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    TransportError(String),

    #[error("login response carried no session cookies")]
    NoCookiesReturned,

    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_detail() {
        let err = Error::TransportError("connection refused".into());
        assert_eq!(err.to_string(), "HTTP request failed: connection refused");

        let err = Error::NoCookiesReturned;
        assert_eq!(err.to_string(), "login response carried no session cookies");
    }
}
