//! # scholar-retrieval
//!
//! Multi-source retrieval fusion for research questions.
//!
//! A query is routed to a subset of four backends (dense vector index,
//! full-text search engine, property graph, relational store), the backends
//! are queried concurrently, and their heterogeneous hits are merged into a
//! single deduplicated, ranked context block.
//!
//! ## Design
//!
//! - [`router`] classifies a query and builds backend-native sub-queries
//! - [`backends`] implement the [`Retriever`] contract, one type per store
//! - [`fusion`] deduplicates by paper identity and ranks by native score
//! - [`format`] renders the fused list as plain text and HTML
//! - [`Orchestrator`] wires them together with per-backend timeouts
//! - Graceful degradation: a failing backend contributes nothing, the
//!   others still answer
//!
//! ## Security
//!
//! - Backend credentials never appear in `Debug` output or error messages
//! - Query text is logged only at trace/debug level
//! - The HTML rendering escapes every payload field

pub mod backends;
pub mod config;
pub mod error;
pub mod format;
pub mod fusion;
pub mod http;
pub mod orchestrator;
pub mod retriever;
pub mod router;
pub mod types;

pub use config::RetrievalConfig;
pub use error::{Result, RetrievalError};
pub use format::{format_context, format_context_html};
pub use fusion::fuse;
pub use orchestrator::{Orchestrator, QueryResponse, SourceReport, SourceStatus};
pub use retriever::Retriever;
pub use router::{QueryPlan, QueryRouter, RouteMode};
pub use types::{Candidate, FusedResult, Payload, ResultSet, Source, SubQuery};

/// Route `query`, query every registered backend it targets, and return
/// the fused context.
///
/// Convenience wrapper around [`Orchestrator::answer`] with automatic
/// route classification.
///
/// # Errors
///
/// Returns [`RetrievalError::EmptyQuery`] if `query` is blank.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # async fn example() -> scholar_retrieval::Result<()> {
/// use scholar_retrieval::backends::RelationalRetriever;
/// use scholar_retrieval::{Orchestrator, RetrievalConfig};
///
/// let orchestrator = Orchestrator::new(RetrievalConfig::default())?
///     .with_retriever(Arc::new(RelationalRetriever::new("sqlite://data/research.db")));
/// let response = scholar_retrieval::retrieve(&orchestrator, "recent papers").await?;
/// println!("{}", response.results);
/// # Ok(())
/// # }
/// ```
pub async fn retrieve(orchestrator: &Orchestrator, query: &str) -> Result<QueryResponse> {
    orchestrator.answer(query, None).await
}
