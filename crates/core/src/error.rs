//! Error types for Verso.
//!
//! This module defines a unified error enum covering the prompt engine's
//! error taxonomy (validation, not-found, conflict, internal) plus the
//! ambient categories (configuration, I/O, serialization).

use thiserror::Error;

/// Unified error type for Verso.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input: empty name or content, bad version number, bad label
    #[error("Validation error: {0}")]
    Validation(String),

    /// Template placeholders with no matching variable, all of them at once
    #[error("Missing template variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    /// Referenced prompt, version or label does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate prompt name or a race on a uniqueness invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failure, timeout or cancellation
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// The four error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP status a transport layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::MissingVariables(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Prefix the message with `ctx`, keeping the variant.
    ///
    /// `MissingVariables` and `Io` carry structured payloads and are
    /// returned unchanged.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            AppError::Validation(msg) => AppError::Validation(format!("{ctx}: {msg}")),
            AppError::NotFound(msg) => AppError::NotFound(format!("{ctx}: {msg}")),
            AppError::Conflict(msg) => AppError::Conflict(format!("{ctx}: {msg}")),
            AppError::Internal(msg) => AppError::Internal(format!("{ctx}: {msg}")),
            AppError::Config(msg) => AppError::Config(format!("{ctx}: {msg}")),
            AppError::Serialization(msg) => AppError::Serialization(format!("{ctx}: {msg}")),
            other @ (AppError::MissingVariables(_) | AppError::Io(_)) => other,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
