//! Error types for the scholar application.

use scholar_retrieval::RetrievalError;

/// Top-level error type for the research assistant.
#[derive(Debug, thiserror::Error)]
pub enum ScholarError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Retrieval pipeline error.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Answer generation (LLM API) error.
    #[error("generation error: {0}")]
    Generation(String),

    /// HTTP server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScholarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_errors_convert() {
        let err: ScholarError = RetrievalError::EmptyQuery.into();
        assert_eq!(err.to_string(), "retrieval error: query must not be empty");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScholarError>();
    }
}
