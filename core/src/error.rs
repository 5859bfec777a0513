//! Error types for the watch pipeline.

use thiserror::Error;

/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur in the watch pipeline.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Watch root not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Include or exclude pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Wire format selector is not one of the known encodings.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Listen address could not be bound.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed at the transport level.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Companion process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
