use thiserror::Error;

/// Errors that can occur in the line-streaming server.
///
/// Only [`ServerError::Bind`] is ever returned to callers. The other variants
/// end a session and are logged where they happen.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unable to bind server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept client connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Failed to send line to client: {0}")]
    Write(#[source] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
