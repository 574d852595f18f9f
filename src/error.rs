//! Error types for the image generation worker.

use thiserror::Error;

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a generation request
#[derive(Debug, Error)]
pub enum Error {
    /// The generation API refused the prompt as invalid or objectionable;
    /// carries the API's user-facing message. Terminal, never retried.
    #[error("generation request rejected: {0}")]
    Rejected(String),

    /// Network or HTTP failure talking to an external service
    #[error("transport error: {0}")]
    Transport(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object store upload failed
    #[error("storage error: {0}")]
    Storage(String),

    /// The background-removal subprocess failed or reported no color
    #[error("subprocess error: {0}")]
    Subprocess(String),

    /// Generated image bytes could not be decoded or re-encoded
    #[error("image decode error: {0}")]
    Decode(String),

    /// The outbound alert event could not be produced
    #[error("publish error: {0}")]
    Publish(String),

    /// Inbound message carried an envelope the handler cannot act on
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Shutdown fired while the request was in flight
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
