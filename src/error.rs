//! Error types for document storage and retrieval.
//!
//! Every failure the core can report is a variant of [`Error`]. Client input
//! problems map to 4xx status codes and are never retried; backend problems
//! map to 5xx and are logged at the HTTP boundary.

use std::fmt;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Document service errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The submitted document has no content.
    #[error("document is empty")]
    DocumentEmpty,

    /// The submitted document exceeds the configured maximum length.
    #[error("document exceeds maximum length ({len} > {max} bytes)")]
    DocumentTooLarge { len: usize, max: usize },

    /// The submitted document is not valid UTF-8 text.
    #[error("document is not valid UTF-8 text")]
    DocumentNotText,

    /// No live document is stored under the key.
    #[error("document not found: {key}")]
    DocumentNotFound { key: String },

    /// Every generated candidate key collided with an existing document.
    #[error("no free key found after {attempts} attempts")]
    KeyGenerationExhausted { attempts: u32 },

    /// The key was rejected before reaching a backend.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: KeyError },

    /// The backend could not be reached or did not answer in time.
    #[error("{backend} store unavailable: {reason}")]
    StoreUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a document not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::DocumentNotFound { key: key.into() }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: KeyError) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Create a store unavailable error.
    pub fn unavailable(backend: &'static str, reason: impl fmt::Display) -> Self {
        Self::StoreUnavailable {
            backend,
            reason: reason.to_string(),
        }
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DocumentEmpty
            | Self::DocumentTooLarge { .. }
            | Self::DocumentNotText
            | Self::InvalidKey { .. } => 400,
            Self::DocumentNotFound { .. } => 404,
            Self::StoreUnavailable { .. } => 503,
            Self::KeyGenerationExhausted { .. } | Self::Config(_) | Self::Io { .. } => 500,
        }
    }

    /// Returns true for errors caused by the client's request.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Reasons a document key is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// Key is empty.
    Empty,
    /// Key is longer than 255 bytes.
    TooLong,
    /// Key contains `/` or `\`.
    PathSeparator,
    /// Key is `.`, `..` or starts with a dot.
    SpecialDirectory,
    /// Key contains a character outside `[A-Za-z0-9_-]`.
    InvalidCharacter,
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "key is empty"),
            Self::TooLong => write!(f, "key is too long (max 255 characters)"),
            Self::PathSeparator => write!(f, "key contains path separators"),
            Self::SpecialDirectory => write!(f, "key cannot start with '.'"),
            Self::InvalidCharacter => write!(f, "key contains characters outside [A-Za-z0-9_-]"),
        }
    }
}

impl std::error::Error for KeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(Error::DocumentEmpty.status_code(), 400);
        assert_eq!(
            Error::DocumentTooLarge { len: 11, max: 10 }.status_code(),
            400
        );
        assert_eq!(Error::not_found("abc").status_code(), 404);
        assert_eq!(
            Error::invalid_key("../x", KeyError::PathSeparator).status_code(),
            400
        );
        assert!(Error::DocumentNotText.is_client_error());
    }

    #[test]
    fn test_backend_errors_map_to_5xx() {
        assert_eq!(
            Error::KeyGenerationExhausted { attempts: 8 }.status_code(),
            500
        );
        let err = Error::unavailable("redis", "connection refused");
        assert_eq!(err.status_code(), 503);
        assert!(!err.is_client_error());
        assert_eq!(
            err.to_string(),
            "redis store unavailable: connection refused"
        );
    }
}
