//! Structured error types for configuration operations.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    IoError,
    ParseError,
    NotFound,
    ClassNotFound,
    Timeout,
    InternalError,
}

/// Errors surfaced by the store and the class resolver.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a file or draining a stream failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The source was malformed, ambiguous, or produced nothing usable.
    #[error("could not parse {origin} as INI: {reason}")]
    Parse { origin: String, reason: String },

    /// An addressed key or path is absent.
    #[error("configuration entry not found: {0}")]
    NotFound(String),

    /// Every resolution strategy was exhausted.
    #[error("could not automatically load class \"{0}\"")]
    ClassNotFound(String),

    #[error("timed out after {0:?} while reading configuration stream")]
    Timeout(Duration),

    #[error("failed to serialize configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn parse(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn class_not_found(name: &str) -> Self {
        Self::ClassNotFound(name.to_string())
    }

    /// The programmatic code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::Io { .. } => ErrorCode::IoError,
            ConfigError::Parse { .. } => ErrorCode::ParseError,
            ConfigError::NotFound(_) => ErrorCode::NotFound,
            ConfigError::ClassNotFound(_) => ErrorCode::ClassNotFound,
            ConfigError::Timeout(_) => ErrorCode::Timeout,
            ConfigError::Json(_) => ErrorCode::InternalError,
        }
    }

    /// A `{code, message}` report suitable for JSON output.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serializable form of a [`ConfigError`].
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
