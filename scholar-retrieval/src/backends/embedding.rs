//! Query embedding for the vector backend.
//!
//! [`Embedder`] turns query text into a dense vector. Two implementations:
//!
//! - [`HttpEmbedder`] calls an OpenAI-compatible `/embeddings` endpoint
//!   (a local sentence-transformer server, or a hosted API).
//! - [`HashingEmbedder`] is a deterministic feature-hashing embedder that
//!   needs no model. Useful offline and in tests; the vector index must
//!   have been built with the same embedder.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::RetrievalError;
use crate::http::{base_url, status_error, transport_error};
use crate::types::Source;

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one query string.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] if the embedding
    /// service cannot be reached, or [`RetrievalError::BackendQuery`] if it
    /// rejects the input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// OpenAI-compatible embedding client.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("url", &self.url.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpEmbedder {
    /// Create a client for the service whose API root is `base` (e.g.
    /// `http://localhost:8080/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if `base` is not a valid URL.
    pub fn new(client: reqwest::Client, base: &str, model: &str) -> Result<Self, RetrievalError> {
        let url = base_url(base)
            .and_then(|b| b.join("embeddings"))
            .map_err(|e| RetrievalError::Config(format!("invalid embedding url {base:?}: {e}")))?;
        Ok(Self {
            client,
            url,
            model: model.to_owned(),
            api_key: None,
        })
    }

    /// Send `key` as a bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&json!({"model": self.model, "input": [text]}));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Source::Vector, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(Source::Vector, status, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Source::Vector, &e))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::query(Source::Vector, "embedding response had no data"))
    }
}

/// Deterministic bag-of-words feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dimension` buckets with a
/// sign bit, then the vector is L2-normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-wide vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously. Used by [`Embedder::embed`] and by index builders.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed_sync(text))
    }
}
