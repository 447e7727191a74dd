// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the feed crate.

use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors raised while producing or storing records.
#[derive(Error, Debug)]
pub enum FeedError {
    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Health CSV could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Payload is not valid UTF-8 text
    #[error("Payload is not UTF-8: {0}")]
    InvalidPayload(#[from] std::string::FromUtf8Error),

    /// Topic log line could not be parsed
    #[error("Corrupt log {path} line {line}: {reason}")]
    CorruptLog {
        path: String,
        line: usize,
        reason: String,
    },

    /// Invalid producer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
