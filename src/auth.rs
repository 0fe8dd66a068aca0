//! Credential models, redacted secrets, and JWT expiry helpers.

pub mod claims;
pub mod credential;
pub mod secret;

pub use claims::*;
pub use credential::*;
pub use secret::*;
