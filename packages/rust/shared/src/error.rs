//! Error types for the topic maps explorer.
//!
//! Library crates use [`TopicMapsError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all topicmaps operations.
#[derive(Debug, thiserror::Error)]
pub enum TopicMapsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Outline (YAML) parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad layout names, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No node exists at the requested tree path.
    #[error("no tree node at {path}")]
    UnknownNode { path: String },

    /// The node has no openable resource, so there is nothing to scan.
    #[error("node '{label}' has no resource to expand")]
    NotExpandable { label: String },

    /// The tree was refreshed while a load for it was in flight.
    #[error("tree was refreshed while loading '{label}'")]
    Refreshed { label: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TopicMapsError>;

impl TopicMapsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    /// Whether this error came from a failed read (the request may be retried).
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
