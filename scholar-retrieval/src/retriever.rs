//! Trait definition for pluggable retrieval backends.
//!
//! Each backend (vector index, search engine, graph database, relational
//! database) implements [`Retriever`] to provide a uniform
//! query-in/ranked-candidates-out interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RetrievalError;
use crate::types::{Candidate, Payload, Source, SubQuery};

/// A pluggable retrieval backend.
///
/// Implementors execute a [`SubQuery`] in their native query language and
/// translate native hits into [`Candidate`] values. Each backend handles its
/// own:
///
/// - connection/handle management (long-lived, reused across requests)
/// - identity assignment from whatever natural key the backend exposes
/// - native scores, passed through without renormalisation
///
/// All implementations must be `Send + Sync` so the orchestrator can share
/// them across concurrent requests.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Execute `sub_query` and return at most `limit` candidates in the
    /// backend's native ranking order.
    ///
    /// Zero hits is `Ok(vec![])`, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] on connection or
    /// transport failure and [`RetrievalError::BackendQuery`] when the
    /// backend rejects the sub-query.
    async fn retrieve(
        &self,
        sub_query: &SubQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError>;

    /// Returns which [`Source`] this implementation serves.
    fn source(&self) -> Source;
}

/// Fields that carry the paper key shared by every ingested store.
const NATURAL_KEY_FIELDS: &[&str] = &["arxiv_id"];

/// Find the shared paper key in a flat record, if present.
///
/// String and integer values qualify; anything else (including empty
/// strings) is ignored.
pub fn natural_key(record: &Payload) -> Option<String> {
    NATURAL_KEY_FIELDS
        .iter()
        .filter_map(|field| record.get(*field))
        .find_map(key_from_value)
}

/// Find the shared paper key in a record or in any object nested one level down.
///
/// Graph rows look like `{"p": {...paper...}, "a": {...author...}}`, so the
/// key lives inside one of the column values.
pub fn nested_natural_key(record: &Payload) -> Option<String> {
    natural_key(record).or_else(|| {
        record.values().find_map(|value| match value {
            Value::Object(inner) => natural_key(inner),
            _ => None,
        })
    })
}

/// Identity for a record that only has a backend-local id (an index row,
/// a search engine `_id`).
///
/// Local ids are scoped by source so that row `0` of one store never matches
/// document `0` of another.
pub fn local_key(source: Source, id: impl std::fmt::Display) -> String {
    format!("{}#{id}", source.name())
}

fn key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    /// A mock backend for testing trait bounds and async execution.
    struct MockRetriever {
        source: Source,
        candidates: Vec<Candidate>,
    }

    #[async_trait]
    impl Retriever for MockRetriever {
        async fn retrieve(
            &self,
            _sub_query: &SubQuery,
            limit: usize,
        ) -> Result<Vec<Candidate>, RetrievalError> {
            if self.candidates.is_empty() {
                return Err(RetrievalError::unavailable(self.source, "mock backend down"));
            }
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }

        fn source(&self) -> Source {
            self.source
        }
    }

    #[test]
    fn trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Retriever>();
    }

    #[tokio::test]
    async fn mock_respects_limit() {
        let retriever = MockRetriever {
            source: Source::Keyword,
            candidates: (0..4)
                .map(|i| Candidate::new(Source::Keyword, Payload::new()).with_identity(i.to_string()))
                .collect(),
        };
        let hits = retriever
            .retrieve(&SubQuery::text("transformers"), 2)
            .await
            .expect("should succeed");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].identity_key.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn mock_propagates_errors() {
        let retriever = MockRetriever {
            source: Source::Graph,
            candidates: vec![],
        };
        let err = retriever
            .retrieve(&SubQuery::text("MATCH (n) RETURN n"), 5)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(retriever.source(), Source::Graph);
    }

    #[test]
    fn natural_key_prefers_arxiv_id() {
        let record = obj(json!({"id": 7, "arxiv_id": "2401.00001v2"}));
        assert_eq!(natural_key(&record).as_deref(), Some("2401.00001v2"));
    }

    #[test]
    fn natural_key_ignores_blank_and_non_scalar() {
        assert_eq!(natural_key(&obj(json!({"arxiv_id": "  "}))), None);
        assert_eq!(natural_key(&obj(json!({"arxiv_id": null}))), None);
        assert_eq!(natural_key(&obj(json!({"arxiv_id": ["x"]}))), None);
        assert_eq!(natural_key(&obj(json!({"title": "no key"}))), None);
    }

    #[test]
    fn local_keys_are_scoped_by_source() {
        assert_eq!(local_key(Source::Vector, 0), "vector#0");
        assert_eq!(local_key(Source::Keyword, "0"), "keyword#0");
        assert_ne!(local_key(Source::Vector, 0), local_key(Source::Keyword, 0));
    }

    #[test]
    fn nested_key_found_in_column_object() {
        let row = obj(json!({
            "a": {"name": "Jane Doe"},
            "p": {"arxiv_id": "2312.11111", "title": "Graphs"}
        }));
        assert_eq!(nested_natural_key(&row).as_deref(), Some("2312.11111"));
    }
}
