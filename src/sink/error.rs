//! Sink-specific error types.
//!
//! Every failed write surfaces as a [`SinkError`]. The dispatcher logs it and
//! drops the batch; nothing is retried.

use thiserror::Error;

/// Errors that can occur while writing a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Socket-level failure (UDP send, address resolution).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server rejected write with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Sink could not be constructed from its configuration.
    #[error("sink config error: {0}")]
    Config(String),
}
