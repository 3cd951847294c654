//! Core types for retrieval candidates, per-source result sets and sub-queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Backend-specific fields of a single hit, kept as an opaque JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// The four retrieval backends a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Dense vector similarity over paper embeddings.
    Vector,
    /// Full-text search engine.
    Keyword,
    /// Property graph of papers and authors.
    Graph,
    /// Relational paper/author tables.
    Relational,
}

impl Source {
    /// Returns the lowercase name used in logs, plans and responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Graph => "graph",
            Self::Relational => "relational",
        }
    }

    /// Returns all backend variants.
    pub fn all() -> &'static [Source] {
        &[Self::Vector, Self::Keyword, Self::Graph, Self::Relational]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "keyword" => Ok(Self::Keyword),
            "graph" => Ok(Self::Graph),
            "relational" | "database" => Ok(Self::Relational),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// A single retrieval hit from one backend.
///
/// `score` keeps the backend's native scale: vector hits carry a
/// distance-derived similarity, keyword hits a text-relevance score, and
/// graph/relational hits are usually unscored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Which backend produced this hit.
    pub source: Source,
    /// Natural unique id when the backend provides one.
    pub identity_key: Option<String>,
    /// Backend-specific fields (title, abstract, highlight, ...).
    pub raw_payload: Payload,
    /// Native relevance score, if the backend scores its results.
    pub score: Option<f64>,
}

impl Candidate {
    /// Create an unscored candidate without a natural key.
    pub fn new(source: Source, raw_payload: Payload) -> Self {
        Self {
            source,
            identity_key: None,
            raw_payload,
            score: None,
        }
    }

    /// Set the natural identity key.
    pub fn with_identity(mut self, key: impl Into<String>) -> Self {
        self.identity_key = Some(key.into());
        self
    }

    /// Set the native score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Candidates grouped by source, as produced by one orchestration pass.
///
/// Sources iterate in insertion order (the order the query plan named them),
/// never in adapter completion order. Each source keeps its native ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(Source, Vec<Candidate>)>,
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidates for `source`.
    ///
    /// Replacing an existing source keeps its original position.
    pub fn insert(&mut self, source: Source, candidates: Vec<Candidate>) {
        if let Some(slot) = self.entries.iter_mut().find(|(s, _)| *s == source) {
            slot.1 = candidates;
        } else {
            self.entries.push((source, candidates));
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, source: Source, candidates: Vec<Candidate>) -> Self {
        self.insert(source, candidates);
        self
    }

    /// Candidates for `source`, if that source was queried.
    pub fn get(&self, source: Source) -> Option<&[Candidate]> {
        self.entries
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, c)| c.as_slice())
    }

    /// Iterate `(source, candidates)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Source, &[Candidate])> {
        self.entries.iter().map(|(s, c)| (*s, c.as_slice()))
    }

    /// Sources present, in insertion order.
    pub fn sources(&self) -> Vec<Source> {
        self.entries.iter().map(|(s, _)| *s).collect()
    }

    /// Total number of candidates across all sources.
    pub fn total_len(&self) -> usize {
        self.entries.iter().map(|(_, c)| c.len()).sum()
    }

    /// True when no source holds any candidate.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

/// A deduplicated, globally ranked sequence of candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FusedResult(Vec<Candidate>);

impl FusedResult {
    /// Wrap an already fused candidate list.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }

    /// Borrow the ranked candidates.
    pub fn as_slice(&self) -> &[Candidate] {
        &self.0
    }

    /// Iterate the ranked candidates.
    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.0.iter()
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing survived fusion.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying vector.
    pub fn into_inner(self) -> Vec<Candidate> {
        self.0
    }
}

/// The literal query one backend should execute, plus its bound parameters.
///
/// `text` is free text for the vector and keyword backends, Cypher for the
/// graph backend and SQL for the relational backend. Parameters are bound by
/// name (`$name` in Cypher, `:name` in SQL) so values never get spliced into
/// the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    /// Query text in the backend's native language.
    pub text: String,
    /// Named string parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl SubQuery {
    /// A parameterless sub-query.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    /// Bind a named parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}
