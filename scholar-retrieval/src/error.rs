//! Error types for the scholar-retrieval crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Credentials never appear in error messages.

use crate::types::Source;

/// Errors that can occur while retrieving from a backend or serving a query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    /// The backend could not be reached (connection, transport or auth failure).
    ///
    /// Retrying the whole request may succeed.
    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        /// Which backend failed.
        backend: Source,
        /// Transport-level detail.
        message: String,
    },

    /// The backend rejected the sub-query as malformed. Not retryable.
    #[error("{backend} backend rejected query: {message}")]
    BackendQuery {
        /// Which backend rejected the query.
        backend: Source,
        /// Backend-provided detail.
        message: String,
    },

    /// The caller submitted an empty or blank query.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Invalid retrieval configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Shorthand for [`RetrievalError::BackendUnavailable`].
    pub fn unavailable(backend: Source, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }

    /// Shorthand for [`RetrievalError::BackendQuery`].
    pub fn query(backend: Source, message: impl Into<String>) -> Self {
        Self::BackendQuery {
            backend,
            message: message.into(),
        }
    }

    /// Whether retrying the whole request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Stable machine-readable kind, used in per-source outcome reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::BackendQuery { .. } => "backend_query_error",
            Self::EmptyQuery => "empty_query",
            Self::Config(_) => "config",
        }
    }
}

/// Convenience type alias for scholar-retrieval results.
pub type Result<T> = std::result::Result<T, RetrievalError>;
