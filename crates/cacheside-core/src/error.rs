//! Error types for the cache-aside layer.

use std::fmt;

/// Error produced by a source of truth.
///
/// Repositories are free to fail with any error type; the loader only needs
/// to carry it back to the caller.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key-value backend could not serve the request.
    #[error("Cache backend unavailable: {message}")]
    BackendUnavailable {
        /// Description of the backend failure.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("Serialization error for '{id}': {message}")]
    Serialization {
        /// Identifier whose payload failed to encode or decode.
        id: String,
        /// Description of the codec failure.
        message: String,
    },

    /// The source of truth failed.
    #[error("Source of truth error: {0}")]
    Source(#[source] SourceError),

    /// The caller's cancellation token fired while the operation was running.
    #[error("Operation cancelled")]
    Cancelled,

    /// A namespace was empty or contained the key separator.
    #[error("Invalid namespace: {namespace:?}")]
    InvalidNamespace {
        /// The rejected namespace.
        namespace: String,
    },
}

impl CacheError {
    /// Creates a new `BackendUnavailable` error.
    #[must_use]
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Serialization {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Wraps a source-of-truth failure.
    #[must_use]
    pub fn source_failure(error: impl Into<SourceError>) -> Self {
        Self::Source(error.into())
    }

    /// Creates a new `InvalidNamespace` error.
    #[must_use]
    pub fn invalid_namespace(namespace: impl Into<String>) -> Self {
        Self::InvalidNamespace {
            namespace: namespace.into(),
        }
    }

    /// Returns `true` if the backend could not be reached.
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Returns `true` if this is a codec failure.
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns `true` if the source of truth failed.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BackendUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::Source(_) => ErrorCategory::Source,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::InvalidNamespace { .. } => ErrorCategory::Validation,
        }
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Backend/connection error.
    Infrastructure,
    /// Encode or decode failure.
    Serialization,
    /// Source-of-truth failure.
    Source,
    /// Cancelled by the caller.
    Cancelled,
    /// Invalid construction parameters.
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Serialization => write!(f, "serialization"),
            Self::Source => write!(f, "source"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Validation => write!(f, "validation"),
        }
    }
}
