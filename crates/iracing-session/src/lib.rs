//! Process-wide authentication session for the member relay
//!
//! Owns the single in-memory credential, the re-authentication gate that
//! decides whether gated requests may proceed, and the pending PKCE login
//! slot for the browser flow. The gate itself is a pure state machine in
//! [`gate`]; [`session::AuthSession`] wires it to real probes and logins.

pub mod error;
pub mod gate;
pub mod session;

pub use error::{Error, Result};
pub use gate::{GateAction, GateEvent, GateState, ReauthPolicy, RejectReason};
pub use session::{AccessDecision, AuthSession, PasswordLogin};
