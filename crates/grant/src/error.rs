//! Error types for token endpoint operations

/// Errors from token endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("grant rejected: {0}")]
    Rejected(String),

    #[error("token endpoint error: {0}")]
    Endpoint(String),

    #[error("invalid token response: {0}")]
    Decode(String),
}

/// Result alias for grant operations.
pub type Result<T> = std::result::Result<T, Error>;
