//! Application configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`, else `~/.config/scholar/config.toml`)
//! 3. environment variables (`NEO4J_URI`, `ES_HOST`, `DB_URL`, ...)
//!
//! [`AppConfig::build_orchestrator`] turns the result into a ready
//! [`Orchestrator`] with one retriever per backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scholar_retrieval::backends::{
    Embedder, GraphCredentials, GraphRetriever, HashingEmbedder, HttpEmbedder, KeywordRetriever,
    RelationalRetriever, VectorRetriever,
};
use scholar_retrieval::{Orchestrator, RetrievalConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScholarError};
use crate::generation::AnswerGenerator;

/// Top-level configuration for the research assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dense vector index.
    pub vector: VectorConfig,
    /// Property graph (Neo4j).
    pub graph: GraphConfig,
    /// Relational paper database.
    pub relational: RelationalConfig,
    /// Full-text search engine (Elasticsearch).
    pub keyword: KeywordConfig,
    /// Fan-out limits, timeouts and fusion size.
    pub retrieval: RetrievalConfig,
    /// HTTP front end.
    pub server: ServerConfig,
    /// Optional answer generation.
    pub generation: GenerationConfig,
}

/// Vector backend settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Flat index file (`{"dimension", "vectors"}` JSON).
    pub index_path: PathBuf,
    /// Per-row paper metadata (JSON list or row-keyed map).
    pub metadata_path: PathBuf,
    /// OpenAI-compatible embeddings API root. Without it queries are
    /// embedded locally by feature hashing.
    pub embedding_url: Option<String>,
    /// Embedding model name sent to `embedding_url`.
    pub embedding_model: String,
    /// Bearer token for `embedding_url`.
    pub embedding_api_key: Option<String>,
    /// Width of the local hashing embedder.
    pub embedding_dimension: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/faiss.index.json"),
            metadata_path: PathBuf::from("data/faiss_meta.json"),
            embedding_url: None,
            embedding_model: "all-MiniLM-L6-v2".to_owned(),
            embedding_api_key: None,
            embedding_dimension: 384,
        }
    }
}

impl std::fmt::Debug for VectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorConfig")
            .field("index_path", &self.index_path)
            .field("metadata_path", &self.metadata_path)
            .field("embedding_url", &self.embedding_url)
            .field("embedding_model", &self.embedding_model)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

/// Graph backend settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// HTTP endpoint of the Neo4j server.
    pub uri: String,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_owned(),
            user: "neo4j".to_owned(),
            password: "password".to_owned(),
            database: "neo4j".to_owned(),
        }
    }
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Relational backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    /// `sqlite://path` URL or bare path of the paper database.
    pub db_url: String,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite://data/research.db".to_owned(),
        }
    }
}

/// Keyword backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Elasticsearch base URL.
    pub es_host: String,
    /// Index holding the papers.
    pub index_name: String,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            es_host: "http://localhost:9200".to_owned(),
            index_name: "papers".to_owned(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Answer generation settings. Disabled unless `api_url` is set.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub api_url: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Chat model name.
    pub model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScholarError::Config(e.to_string()))
    }

    /// Returns the default config file path: `~/.config/scholar/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = dirs::config_dir() {
            config.join("scholar").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("scholar").join("config.toml")
        } else {
            PathBuf::from("/tmp/scholar-config/config.toml")
        }
    }

    /// Resolve the full configuration: defaults, then `path` (or the
    /// default config file when it exists), then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` cannot be loaded, a file is
    /// malformed, an environment override is invalid, or the result fails
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] if `SCHOLAR_PORT` is not a port number.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("FAISS_INDEX_PATH") {
            self.vector.index_path = PathBuf::from(v);
        }
        if let Some(v) = var("FAISS_META_PATH") {
            self.vector.metadata_path = PathBuf::from(v);
        }
        if let Some(v) = var("EMBEDDING_URL") {
            self.vector.embedding_url = Some(v);
        }
        if let Some(v) = var("EMBEDDING_MODEL") {
            self.vector.embedding_model = v;
        }
        if let Some(v) = var("EMBEDDING_API_KEY") {
            self.vector.embedding_api_key = Some(v);
        }
        if let Some(v) = var("NEO4J_URI") {
            self.graph.uri = v;
        }
        if let Some(v) = var("NEO4J_USER") {
            self.graph.user = v;
        }
        if let Some(v) = var("NEO4J_PASSWORD") {
            self.graph.password = v;
        }
        if let Some(v) = var("NEO4J_DATABASE") {
            self.graph.database = v;
        }
        if let Some(v) = var("DB_URL") {
            self.relational.db_url = v;
        }
        if let Some(v) = var("ES_HOST") {
            self.keyword.es_host = v;
        }
        if let Some(v) = var("ES_INDEX") {
            self.keyword.index_name = v;
        }
        if let Some(v) = var("SCHOLAR_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("SCHOLAR_PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|e| ScholarError::Config(format!("SCHOLAR_PORT {v:?}: {e}")))?;
        }
        if let Some(v) = var("LLM_API_URL") {
            self.generation.api_url = Some(v);
        }
        if let Some(v) = var("LLM_API_KEY") {
            self.generation.api_key = Some(v);
        }
        if let Some(v) = var("LLM_MODEL") {
            self.generation.model = v;
        }
        Ok(())
    }

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.retrieval
            .validate()
            .map_err(|e| ScholarError::Config(e.to_string()))?;
        if self.vector.embedding_dimension == 0 {
            return Err(ScholarError::Config(
                "vector.embedding_dimension must be greater than 0".into(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ScholarError::Config("server.host must not be empty".into()));
        }
        Ok(())
    }

    /// Build an orchestrator with every backend this config describes.
    ///
    /// Network backends connect lazily, so an unreachable service only
    /// shows up as an unavailable source at query time. A vector index that
    /// cannot be loaded is logged and left unregistered.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend URL is malformed or the retrieval
    /// settings are invalid.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let client = scholar_retrieval::http::build_client(self.retrieval.adapter_timeout())?;
        let mut orchestrator = Orchestrator::new(self.retrieval.clone())?;

        orchestrator.register(Arc::new(KeywordRetriever::new(
            client.clone(),
            &self.keyword.es_host,
            &self.keyword.index_name,
        )?));
        orchestrator.register(Arc::new(GraphRetriever::new(
            client.clone(),
            &GraphCredentials {
                uri: self.graph.uri.clone(),
                user: self.graph.user.clone(),
                password: self.graph.password.clone(),
                database: self.graph.database.clone(),
            },
        )?));
        orchestrator.register(Arc::new(RelationalRetriever::new(&self.relational.db_url)));

        let embedder = self.build_embedder(client)?;
        match VectorRetriever::open(
            &self.vector.index_path,
            Some(&self.vector.metadata_path),
            embedder,
        ) {
            Ok(vector) => orchestrator.register(Arc::new(vector)),
            Err(e) => tracing::warn!(
                path = %self.vector.index_path.display(),
                error = %e,
                "vector index not loaded; vector source disabled"
            ),
        }

        tracing::debug!(sources = ?orchestrator.registered(), "orchestrator ready");
        Ok(orchestrator)
    }

    fn build_embedder(&self, client: reqwest::Client) -> Result<Arc<dyn Embedder>> {
        match &self.vector.embedding_url {
            Some(url) => {
                let mut embedder = HttpEmbedder::new(client, url, &self.vector.embedding_model)?;
                if let Some(key) = &self.vector.embedding_api_key {
                    embedder = embedder.with_api_key(key.clone());
                }
                Ok(Arc::new(embedder))
            }
            None => Ok(Arc::new(HashingEmbedder::new(self.vector.embedding_dimension))),
        }
    }

    /// Build the answer generator, or `None` when no `api_url` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] if `api_url` is malformed.
    pub fn build_generator(&self) -> Result<Option<AnswerGenerator>> {
        let Some(url) = &self.generation.api_url else {
            return Ok(None);
        };
        let client = scholar_retrieval::http::build_client(std::time::Duration::from_secs(60))?;
        let mut generator = AnswerGenerator::new(client, url, &self.generation.model)?;
        if let Some(key) = &self.generation.api_key {
            generator = generator.with_api_key(key.clone());
        }
        Ok(Some(generator))
    }
}
