//! Error types for session operations
//!
//! Most lifecycle outcomes are not errors: a rejected login is a structured
//! `AuthAttempt::Denied`, a failed refresh degrades to the existing token,
//! and a malformed persisted blob signs the session out silently. These
//! variants cover the faults that do cross the API boundary: configuration
//! mistakes, adapter failures, and transport failures outside the lifecycle's
//! degrade paths.

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("grant error: {0}")]
    Grant(#[from] oauth_grant::Error),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("API request failed: {0}")]
    Http(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
