//! Error types for galleryforge.
//!
//! Library crates use [`GalleryError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all galleryforge operations.
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// Configuration loading or validation error. Fatal for a run.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while discovering or fetching documents.
    #[error("network error: {0}")]
    Network(String),

    /// Transformation service error (transport, status, or reply parsing).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (duplicate source names, bad locations, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GalleryError>;

impl GalleryError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Whether this error must abort a pipeline run.
    ///
    /// Only configuration and validation problems are fatal; everything
    /// else degrades to partial results.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Validation { .. })
    }
}
