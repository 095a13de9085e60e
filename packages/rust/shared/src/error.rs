//! Error types for ReviewHarvest.
//!
//! Library crates use [`ReviewHarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Field-level extraction misses are not errors: they surface as `None`
//! on the affected [`Review`](crate::Review) field.

use std::path::PathBuf;

/// Top-level error type for all ReviewHarvest operations.
#[derive(Debug, thiserror::Error)]
pub enum ReviewHarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Request failed, timed out, or returned a non-success status.
    #[error("network error: {0}")]
    Network(String),

    /// An element that defines what a product or listing *is* was absent.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Store read, write, or delete failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (bad URL, malformed stored row, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReviewHarvestError>;

impl ReviewHarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structural extraction error.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
