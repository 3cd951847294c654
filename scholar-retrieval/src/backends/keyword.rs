//! Full-text keyword backend over the Elasticsearch `_search` API.
//!
//! Runs a fuzzy `multi_match` across the paper text fields and keeps the
//! engine's `_score` as the candidate score.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::error::RetrievalError;
use crate::http::{status_error, transport_error};
use crate::retriever::{local_key, natural_key, Retriever};
use crate::types::{Candidate, Payload, Source, SubQuery};

/// Fields searched when none are configured.
pub const DEFAULT_FIELDS: &[&str] = &["title", "abstract", "full_text"];

/// Elasticsearch keyword retriever.
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    client: reqwest::Client,
    search_url: Url,
    fields: Vec<String>,
}

impl KeywordRetriever {
    /// Create a retriever for `index_name` on the cluster at `es_host`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if `es_host` is not a valid URL.
    pub fn new(
        client: reqwest::Client,
        es_host: &str,
        index_name: &str,
    ) -> Result<Self, RetrievalError> {
        let base = crate::http::base_url(es_host)
            .map_err(|e| RetrievalError::Config(format!("invalid search host {es_host:?}: {e}")))?;
        let search_url = base
            .join(&format!("{}/_search", index_name.trim_matches('/')))
            .map_err(|e| RetrievalError::Config(format!("invalid index name {index_name:?}: {e}")))?;
        Ok(Self {
            client,
            search_url,
            fields: DEFAULT_FIELDS.iter().map(|f| (*f).to_owned()).collect(),
        })
    }

    /// Override the searched fields.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// The `_search` endpoint this retriever posts to.
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    fn request_body(&self, query: &str, limit: usize) -> Value {
        json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": self.fields,
                    "type": "best_fields",
                    "fuzziness": "AUTO"
                }
            },
            "size": limit
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: HitsEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Payload,
}

impl Hit {
    fn into_candidate(self) -> Candidate {
        let identity = natural_key(&self.source)
            .or_else(|| self.id.as_ref().map(|id| local_key(Source::Keyword, id)));

        let mut payload = Payload::new();
        if let Some(id) = &self.id {
            payload.insert("id".into(), Value::String(id.clone()));
        }
        payload.insert("source".into(), Value::Object(self.source));

        Candidate {
            source: Source::Keyword,
            identity_key: identity,
            raw_payload: payload,
            score: self.score,
        }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(
        &self,
        sub_query: &SubQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        tracing::trace!(query = %sub_query.text, limit, "keyword search");

        let response = self
            .client
            .post(self.search_url.clone())
            .json(&self.request_body(&sub_query.text, limit))
            .send()
            .await
            .map_err(|e| transport_error(Source::Keyword, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Source::Keyword, status, &body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Source::Keyword, &e))?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .take(limit)
            .map(Hit::into_candidate)
            .collect())
    }

    fn source(&self) -> Source {
        Source::Keyword
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn retriever(host: &str, index: &str) -> Result<KeywordRetriever, RetrievalError> {
        let client = crate::http::build_client(Duration::from_secs(2))?;
        KeywordRetriever::new(client, host, index)
    }

    #[test]
    fn search_url_joins_host_and_index() {
        let r = retriever("http://localhost:9200", "papers").expect("valid");
        assert_eq!(r.search_url().as_str(), "http://localhost:9200/papers/_search");
    }

    #[test]
    fn invalid_host_rejected() {
        let err = retriever("not a url", "papers").unwrap_err();
        assert!(err.to_string().contains("invalid search host"));
    }

    #[test]
    fn request_body_is_fuzzy_multi_match() {
        let r = retriever("http://localhost:9200", "papers").expect("valid");
        let body = r.request_body("graph nets", 5);
        assert_eq!(body["size"], json!(5));
        assert_eq!(body["query"]["multi_match"]["fuzziness"], json!("AUTO"));
        assert_eq!(body["query"]["multi_match"]["type"], json!("best_fields"));
        assert_eq!(
            body["query"]["multi_match"]["fields"],
            json!(["title", "abstract", "full_text"])
        );
    }

    #[test]
    fn hit_prefers_arxiv_id_over_document_id() {
        let hit: Hit = serde_json::from_value(json!({
            "_id": "doc-1",
            "_score": 3.2,
            "_source": {"arxiv_id": "2401.00001", "title": "T"}
        }))
        .expect("deserialize");
        let c = hit.into_candidate();
        assert_eq!(c.identity_key.as_deref(), Some("2401.00001"));
        assert_eq!(c.score, Some(3.2));
        assert_eq!(c.raw_payload["id"], json!("doc-1"));
        assert_eq!(c.raw_payload["source"]["title"], json!("T"));
    }

    #[test]
    fn hit_without_source_key_uses_document_id() {
        let hit: Hit = serde_json::from_value(json!({"_id": "doc-9", "_score": null}))
            .expect("deserialize");
        let c = hit.into_candidate();
        assert_eq!(c.identity_key.as_deref(), Some("keyword#doc-9"));
        assert_eq!(c.score, None);
    }

    #[tokio::test]
    async fn zero_limit_short_circuits() {
        let r = retriever("http://127.0.0.1:1", "papers").expect("valid");
        let hits = r.retrieve(&SubQuery::text("x"), 0).await.expect("ok");
        assert!(hits.is_empty());
    }
}
