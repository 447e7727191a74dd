//! Error types for Pulsewatch
//!
//! Insufficient window history is deliberately absent from this module: a
//! window that is not yet full yields `None` statistics and no alerts.

use thiserror::Error;

/// Result type alias for Pulsewatch operations
pub type Result<T> = std::result::Result<T, PulsewatchError>;

/// Main error type for Pulsewatch operations
#[derive(Error, Debug)]
pub enum PulsewatchError {
    /// A raw record could not be turned into an observation
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// The record source failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors while decoding a raw payload into an observation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload is not valid JSON for the expected event shape
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// A required field is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Timestamp could not be parsed as ISO-8601
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Numeric field is NaN or infinite
    #[error("Non-finite value for field {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// Series key is empty
    #[error("Empty series key")]
    EmptySeriesKey,
}

/// Errors raised by a record source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record could not be read back
    #[error("Corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// Offset commit failed
    #[error("Commit of offset {offset} failed: {reason}")]
    Commit { offset: u64, reason: String },
}

/// Errors related to configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON
    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Environment override could not be parsed
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    /// Value out of range
    #[error("Invalid setting {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },
}
