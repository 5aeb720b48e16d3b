//! Error types for stagepass
//!
//! This module defines the error hierarchy used throughout the engine.
//! We use `thiserror` for library-style errors that are part of the API.
//!
//! Note the deliberate asymmetry: configuration errors fail loudly at
//! startup, while credential and store-lookup errors are absorbed inside
//! the role resolver as "capability not granted" and never surface to a
//! caller as anything but a 401/403 decision.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors
///
/// All variants are startup/test-time failures; none of them can occur
/// while serving traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Duplicate route rule: {method} {pattern}")]
    DuplicateRoute { pattern: String, method: String },

    #[error("Route registry does not cover the router: missing {missing:?}, extra {extra:?}")]
    RouteCoverage {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bearer token codec errors
///
/// `Expired` and `Invalid` are absorbed by the role resolver (a bad token
/// simply proves no subject); `Issue` can only occur on the issuing path.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Failed to issue token: {0}")]
    Issue(String),
}

/// Persistence reader errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Referenced row not found")]
    NotFound,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for store lookups
pub type StoreResult<T> = std::result::Result<T, StoreError>;
