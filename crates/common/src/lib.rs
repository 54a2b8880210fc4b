//! Shared types for the iRacing member relay workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
