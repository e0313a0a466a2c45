//! Error types for meterbill
//!
//! This module defines the error types used by the I/O and CLI layers of
//! meterbill. The calculation engine itself never returns these: a missing
//! or broken tariff falls back to a default, and a broken record is dropped.
//!
//! # Example
//!
//! ```
//! use meterbill_core::error::{MeterbillError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to MeterbillError
//!     let _file = std::fs::read_to_string("nonexistent.json")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for meterbill operations
#[derive(Error, Debug)]
pub enum MeterbillError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown utility stream name
    #[error("Unknown utility stream: {0}")]
    UnknownStream(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Tariff configuration failed validation
    #[error("Invalid tariff: {0}")]
    InvalidTariff(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File watcher error
    #[error("Watch error: {0}")]
    Watch(String),
}

/// Convenience type alias for Results in meterbill
pub type Result<T> = std::result::Result<T, MeterbillError>;
