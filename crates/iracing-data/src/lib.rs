//! Read-side queries against the iRacing members data API.
//!
//! Everything here presents an already-established [`Credential`] from
//! `iracing-auth`; acquiring and refreshing that credential is the session
//! layer's problem.
//!
//! [`Credential`]: iracing_auth::Credential

pub mod error;
pub mod lookup;

pub use error::{Error, Result};
pub use lookup::{DriverLookupResult, DriverRecord, find_driver_by_name};
