//! Client-side error types.

use thiserror::Error;

/// Errors from talking to the environment server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not decode into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// An operation that needs an initialized task was called without one.
    #[error("No task is initialized on this client")]
    NotInitialized,
}
