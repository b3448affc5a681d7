//! # Error Types
//!
//! Custom error types for Shift Cluster using `thiserror`.
//!
//! Only [`ShiftClusterError`] and [`LinkError`] ever leave a task. Decode
//! failures and rejected shift intents are part of normal operation and are
//! handled where they occur.

use thiserror::Error;

/// Main error type for Shift Cluster
#[derive(Debug, Error)]
pub enum ShiftClusterError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial link errors
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Shift input device errors
    #[error("Input error: {0}")]
    Input(String),

    /// No keyboard-like input device found
    #[error("No shift input device found")]
    InputNotFound,

    /// Telemetry recording errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// A session task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serial link failures (open, read, write)
#[derive(Debug, Error)]
pub enum LinkError {
    /// No device matched the discovery patterns
    #[error("No serial device found (searched: {0})")]
    NotFound(String),

    /// The device exists but could not be opened
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Reading from the link failed
    #[error("Failed to read from link: {0}")]
    Read(#[source] std::io::Error),

    /// Writing to the link failed
    #[error("Failed to write to link: {0}")]
    Write(#[source] std::io::Error),

    /// The link was closed (end of stream or shutdown)
    #[error("Link closed")]
    Closed,
}

/// Malformed or incomplete telemetry frame
///
/// The frame is discarded and the previous snapshot stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} fields, got {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{tag}' is not a number: {value:?}")]
    InvalidNumber { tag: &'static str, value: String },

    #[error("field '{tag}' out of range: {value}")]
    OutOfRange { tag: &'static str, value: String },

    #[error("frame exceeds {0} bytes")]
    Overflow(usize),

    #[error("frame is not valid ASCII")]
    NotAscii,
}

/// Result type alias for Shift Cluster
pub type Result<T> = std::result::Result<T, ShiftClusterError>;
