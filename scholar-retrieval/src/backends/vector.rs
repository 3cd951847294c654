//! Dense vector backend: exact L2 search over a flat in-memory index.
//!
//! The index file is JSON, `{"dimension": d, "vectors": [[...], ...]}`, with
//! row `i` describing paper `i` of the metadata file (a JSON list, or a map
//! keyed by row number). Distances are squared L2, as a flat L2 index
//! reports them; the candidate score is `1 / (1 + distance)`.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::embedding::Embedder;
use crate::error::RetrievalError;
use crate::retriever::{local_key, natural_key, Retriever};
use crate::types::{Candidate, Payload, Source, SubQuery};

/// A flat (brute-force) vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build an index, checking every row has `dimension` components.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] on a dimension mismatch.
    pub fn new(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self, RetrievalError> {
        if dimension == 0 {
            return Err(RetrievalError::Config("index dimension must be > 0".into()));
        }
        if let Some(row) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(RetrievalError::Config(format!(
                "index row {row} has {} components, expected {dimension}",
                vectors[row].len()
            )));
        }
        Ok(Self { dimension, vectors })
    }

    /// Load an index from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw: Self = read_json(path)?;
        Self::new(raw.dimension, raw.vectors)
    }

    /// Vector width.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when no rows are indexed.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` nearest rows to `query` as `(row, squared_distance)`,
    /// nearest first. Equal distances keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, v)| (row, squared_l2(query, v)))
            .filter(|(_, d)| d.is_finite())
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, RetrievalError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| RetrievalError::Config(format!("cannot parse {}: {e}", path.display())))
}

/// Per-row paper metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(Value);

impl Metadata {
    /// Wrap a JSON list or row-keyed map.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Load metadata from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        read_json(path).map(Self)
    }

    /// Metadata for `row`, if any.
    pub fn get(&self, row: usize) -> Option<&Value> {
        match &self.0 {
            Value::Array(rows) => rows.get(row),
            Value::Object(map) => map.get(&row.to_string()),
            _ => None,
        }
        .filter(|v| !v.is_null())
    }
}

/// Vector similarity retriever.
#[derive(Clone)]
pub struct VectorRetriever {
    index: Arc<FlatIndex>,
    metadata: Arc<Metadata>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("dimension", &self.index.dimension())
            .field("rows", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl VectorRetriever {
    /// Create a retriever from an in-memory index and metadata.
    pub fn new(index: FlatIndex, metadata: Metadata, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index: Arc::new(index),
            metadata: Arc::new(metadata),
            embedder,
        }
    }

    /// Load the index and (optional) metadata files.
    ///
    /// A metadata path that does not exist is treated as "no metadata".
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the index cannot be loaded or
    /// an existing metadata file cannot be parsed.
    pub fn open(
        index_path: &Path,
        metadata_path: Option<&Path>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RetrievalError> {
        let index = FlatIndex::load(index_path)?;
        let metadata = match metadata_path {
            Some(path) if path.exists() => Metadata::load(path)?,
            _ => Metadata::default(),
        };
        tracing::debug!(rows = index.len(), dimension = index.dimension(), "vector index loaded");
        Ok(Self::new(index, metadata, embedder))
    }

    fn to_candidate(&self, row: usize, distance: f32) -> Candidate {
        let meta = self.metadata.get(row).cloned();
        let identity = match &meta {
            Some(Value::Object(fields)) => natural_key(fields),
            _ => None,
        }
        .unwrap_or_else(|| local_key(Source::Vector, row));

        let mut payload = Payload::new();
        payload.insert("index".into(), Value::from(row));
        payload.insert("metadata".into(), meta.unwrap_or(Value::Null));

        Candidate {
            source: Source::Vector,
            identity_key: Some(identity),
            raw_payload: payload,
            score: Some(1.0 / (1.0 + f64::from(distance))),
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(
        &self,
        sub_query: &SubQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        if limit == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(query = %sub_query.text, limit, "vector search");

        let embedding = self.embedder.embed(&sub_query.text).await?;
        if embedding.len() != self.index.dimension() {
            return Err(RetrievalError::query(
                Source::Vector,
                format!(
                    "query embedding has {} components, index expects {}",
                    embedding.len(),
                    self.index.dimension()
                ),
            ));
        }

        Ok(self
            .index
            .search(&embedding, limit)
            .into_iter()
            .map(|(row, distance)| self.to_candidate(row, distance))
            .collect())
    }

    fn source(&self) -> Source {
        Source::Vector
    }
}
