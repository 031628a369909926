//! Error types for Scribe.
//!
//! Library crates use [`ScribeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the HTTP server maps it onto the
//! JSON error envelope.

use std::path::PathBuf;

/// Top-level error type for all Scribe operations.
#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure talking to a provider.
    #[error("network error: {0}")]
    Network(String),

    /// The language-model provider rejected or failed a call.
    #[error("model error: {0}")]
    Llm(String),

    /// The web-search provider rejected or failed a call.
    #[error("search error: {0}")]
    Search(String),

    /// A provider response could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Caller input failed validation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
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

    /// Whether this error was caused by the caller's input rather than by
    /// a provider or the environment.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ScribeError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ScribeError::Llm("HTTP 429 Too Many Requests: slow down".into());
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn only_validation_errors_are_client_errors() {
        assert!(ScribeError::validation("session has no messages").is_validation());
        assert!(!ScribeError::Search("HTTP 500".into()).is_validation());
        assert!(!ScribeError::Network("connection refused".into()).is_validation());
    }
}
