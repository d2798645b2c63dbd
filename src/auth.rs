//! Credential identity configuration and redacted token secrets.

pub mod identity;
pub mod secret;

pub use identity::*;
pub use secret::*;
