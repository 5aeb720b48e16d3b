//! Shared utilities

mod secret;

pub use secret::SecretString;
