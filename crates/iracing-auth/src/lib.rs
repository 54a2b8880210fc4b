//! iRacing authentication library
//!
//! Covers both ways the relay can authenticate against the members API and
//! keeps the resulting credential as a plain in-memory value. The crate has
//! no dependency on the relay binary and can be tested and used on its own.
//!
//! Credential flow:
//! 1. Password deployments call `password::login_with_password()` and get a
//!    cookie-jar credential back
//! 2. OAuth deployments redirect the browser via
//!    `pkce::build_authorization_url()` and later call
//!    `token::exchange_code()` with the authorization code
//! 3. Every gated request probes the credential with `verify::verify()`
//! 4. On probe failure the session layer runs the password login again and
//!    swaps the credential whole

pub mod constants;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod password;
pub mod pkce;
pub mod token;
pub mod verify;

pub use constants::*;
pub use credentials::{CookieJar, Credential};
pub use endpoints::{Endpoints, OAuthSettings};
pub use error::{Error, Result};
pub use password::{hash_password, login_with_password};
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use token::{TokenResponse, exchange_code};
pub use verify::verify;
