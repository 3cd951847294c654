//! Property-graph backend over the Neo4j HTTP transactional API.
//!
//! Each sub-query runs as a single auto-committed Cypher statement with its
//! parameters bound server-side. Rows come back as `{column: value}` maps,
//! the same shape a driver's `record.data()` would produce. Graph hits are
//! unscored.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::error::RetrievalError;
use crate::http::{base_url, status_error, transport_error};
use crate::retriever::{nested_natural_key, Retriever};
use crate::types::{Candidate, Payload, Source, SubQuery};

/// Neo4j error codes in this class mean the statement itself was bad.
const CLIENT_ERROR_PREFIX: &str = "Neo.ClientError.";
/// Client errors that are really about credentials, not the statement.
const SECURITY_ERROR_PREFIX: &str = "Neo.ClientError.Security.";

/// Connection details for the graph database.
#[derive(Clone)]
pub struct GraphCredentials {
    /// HTTP endpoint of the server, e.g. `http://localhost:7474`.
    pub uri: String,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
    /// Database name (`neo4j` on a default install).
    pub database: String,
}

impl std::fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Neo4j Cypher retriever.
#[derive(Clone)]
pub struct GraphRetriever {
    client: reqwest::Client,
    commit_url: Url,
    user: String,
    password: String,
}

impl std::fmt::Debug for GraphRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRetriever")
            .field("commit_url", &self.commit_url.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl GraphRetriever {
    /// Create a retriever for the database described by `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the URI is not a valid URL.
    pub fn new(
        client: reqwest::Client,
        credentials: &GraphCredentials,
    ) -> Result<Self, RetrievalError> {
        let base = base_url(&credentials.uri).map_err(|e| {
            RetrievalError::Config(format!("invalid graph uri {:?}: {e}", credentials.uri))
        })?;
        let commit_url = base
            .join(&format!("db/{}/tx/commit", credentials.database.trim_matches('/')))
            .map_err(|e| RetrievalError::Config(format!("invalid graph database name: {e}")))?;
        Ok(Self {
            client,
            commit_url,
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        })
    }

    /// The transactional commit endpoint this retriever posts to.
    pub fn commit_url(&self) -> &Url {
        &self.commit_url
    }

    fn request_body(sub_query: &SubQuery) -> Value {
        json!({
            "statements": [{
                "statement": sub_query.text,
                "parameters": sub_query.params,
                "resultDataContents": ["row"]
            }]
        })
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Neo4jError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Neo4jError {
    fn into_retrieval_error(self) -> RetrievalError {
        let message = format!("{}: {}", self.code, self.message);
        if self.code.starts_with(CLIENT_ERROR_PREFIX) && !self.code.starts_with(SECURITY_ERROR_PREFIX)
        {
            RetrievalError::query(Source::Graph, message)
        } else {
            RetrievalError::unavailable(Source::Graph, message)
        }
    }
}

/// Zip column names with row values into a record map.
fn row_to_candidate(columns: &[String], row: Vec<Value>) -> Candidate {
    let record: Payload = columns.iter().cloned().zip(row).collect();
    let identity = nested_natural_key(&record);
    Candidate {
        source: Source::Graph,
        identity_key: identity,
        raw_payload: record,
        score: None,
    }
}

#[async_trait]
impl Retriever for GraphRetriever {
    async fn retrieve(
        &self,
        sub_query: &SubQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        tracing::trace!(statement = %sub_query.text, limit, "graph query");

        let response = self
            .client
            .post(self.commit_url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .json(&Self::request_body(sub_query))
            .send()
            .await
            .map_err(|e| transport_error(Source::Graph, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Source::Graph, status, &body));
        }

        let parsed: CommitResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Source::Graph, &e))?;

        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(err.into_retrieval_error());
        }

        Ok(parsed
            .results
            .into_iter()
            .flat_map(|result| {
                let columns = result.columns;
                result
                    .data
                    .into_iter()
                    .map(move |data| row_to_candidate(&columns, data.row))
            })
            .take(limit)
            .collect())
    }

    fn source(&self) -> Source {
        Source::Graph
    }
}
