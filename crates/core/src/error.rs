//! Error types for the tickpack pipeline.
//!
//! Errors are scoped: a [`RowParseError`] only skips a row, file-level
//! variants skip a file, and ticker-level variants fail one ticker task
//! without touching its siblings. See [`Error::is_ticker_fatal`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single CSV row that could not be folded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowParseError {
    /// The row is shorter than the column mapping requires.
    #[error("missing column `{column}` (index {index}, row has {len} fields)")]
    MissingColumn {
        column: &'static str,
        index: usize,
        len: usize,
    },

    /// The amount field is not a decimal number.
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),

    /// The CSV reader rejected the row.
    #[error("malformed csv row: {0}")]
    Csv(String),
}

/// Main error type for the tickpack pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A directory or file could not be listed or opened.
    #[error("Cannot access {}: {source}", .path.display())]
    InputAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compressed stream is not valid gzip or is truncated.
    #[error("Decompression failed for {}: {message}", .path.display())]
    Decompression { path: PathBuf, message: String },

    /// Row-level parse failure.
    #[error("Row parse error: {0}")]
    RowParse(#[from] RowParseError),

    /// An aggregated bucket could not be rendered as a tick line.
    #[error("Format error: {0}")]
    Format(String),

    /// The output file could not be created or appended to.
    #[error("Cannot write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoding a file took longer than the configured budget.
    #[error("Timed out after {after:?} processing {}", .path.display())]
    Timeout { path: PathBuf, after: Duration },

    /// The run was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// Archive creation error.
    #[error("Archive error: {0}")]
    Archive(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an input access error.
    pub fn input_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::InputAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a decompression error.
    pub fn decompression(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Error::Decompression {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create an output write error.
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Create an archive error.
    pub fn archive(msg: impl Into<String>) -> Self {
        Error::Archive(msg.into())
    }

    /// Whether this error ends the ticker task that raised it.
    ///
    /// File-scoped errors (`Decompression`, `Format`, `Timeout`, `RowParse`)
    /// only skip the file being processed.
    pub fn is_ticker_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Decompression { .. }
                | Error::Format(_)
                | Error::Timeout { .. }
                | Error::RowParse(_)
        )
    }
}
