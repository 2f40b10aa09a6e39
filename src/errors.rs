//! Defines application-specific error types.
//!
//! This module provides the `Error` enum, which categorizes the failures
//! that can occur during a scan, offering more context than generic I/O or
//! `anyhow` errors, plus the crate-wide `Result` alias.

use std::path::Path;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// How a filesystem error relates to the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoClassification {
    /// Transient; the operation was or may be retried.
    Retryable,
    /// Will not succeed on retry (missing path, permissions, wrong kind).
    Permanent,
    /// Retryable but the attempt budget was exhausted.
    GaveUp,
}

impl std::fmt::Display for IoClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoClassification::Retryable => write!(f, "retryable"),
            IoClassification::Permanent => write!(f, "permanent"),
            IoClassification::GaveUp => write!(f, "gave-up"),
        }
    }
}

/// Application-specific errors used throughout `copytree`.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad arguments: empty base path, unknown format, conflicting options.
    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// A profile was requested by name but no profile file exists for it.
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    /// A glob pattern could not be parsed (unbalanced braces, bad class).
    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern {
        /// The offending pattern text.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    /// The scan was cancelled via the cancellation token (e.g. Ctrl+C).
    #[error("Scan aborted")]
    ScanAborted,

    /// Classified filesystem error for a specific path.
    #[error("I/O error accessing path '{path}' ({classification}): {source}")]
    ScanIo {
        /// The path that caused the I/O error.
        path: String,
        /// Retry classification of the underlying error.
        classification: IoClassification,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// A transformer failed on a record; localized, the pipeline continues.
    #[error("Transformer '{transformer}' failed on '{path}': {reason}")]
    Transformer {
        /// Name of the transformer that raised.
        transformer: String,
        /// Relative path of the record being transformed.
        path: String,
        /// Failure detail.
        reason: String,
    },

    /// Formatter serialization failure; fatal.
    #[error("Output error: {0}")]
    Output(String),

    #[cfg(feature = "clipboard")]
    /// Clipboard access or write failure.
    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl Error {
    /// Builds a `ScanIo` error with path context and a classification.
    pub fn scan_io<P: AsRef<Path>>(
        source: std::io::Error,
        path: P,
        classification: IoClassification,
    ) -> Self {
        Error::ScanIo {
            path: path.as_ref().display().to_string(),
            classification,
            source,
        }
    }
}

/// Wraps a raw `io::Error` for a path without consulting the retry layer.
///
/// Used where a single attempt is all that makes sense (output files,
/// profile reads). Walker and loader reads go through `retry` instead.
pub fn io_error_with_path<P: AsRef<Path>>(source: std::io::Error, path: P) -> Error {
    let classification = crate::retry::classify(&source);
    Error::scan_io(source, path, classification)
}
