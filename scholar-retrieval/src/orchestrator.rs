//! Retrieval orchestrator: route, concurrent fan-out, fuse, format.
//!
//! Holds one [`Retriever`] per [`Source`], registered at construction, and
//! drives a single query through the whole pipeline. Backend failures never
//! fail the request: each one degrades to an empty list for its source and
//! is reported in [`QueryResponse::sources`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::format::{format_context, to_html};
use crate::fusion::fuse;
use crate::retriever::Retriever;
use crate::router::{QueryRouter, RouteMode};
use crate::types::{Candidate, FusedResult, ResultSet, Source, SubQuery};

/// What happened to one backend during a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// The backend answered with `count` candidates.
    Ok {
        /// Number of candidates returned.
        count: usize,
    },
    /// The backend missed the adapter deadline.
    TimedOut,
    /// The backend failed or is not registered.
    Failed {
        /// Stable error kind, see [`RetrievalError::kind`].
        kind: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Per-source entry of [`QueryResponse::sources`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// The backend.
    pub source: Source,
    /// Its outcome.
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// The result of one orchestrated query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// The routing decision.
    pub mode: RouteMode,
    /// Plain-text context block.
    pub results: String,
    /// HTML-safe rendering of `results`.
    pub results_html: String,
    /// The fused candidates behind `results`.
    pub hits: FusedResult,
    /// Per-source outcomes, in plan order.
    pub sources: Vec<SourceReport>,
}

impl QueryResponse {
    /// True when every consulted backend answered.
    pub fn is_complete(&self) -> bool {
        self.sources
            .iter()
            .all(|r| matches!(r.status, SourceStatus::Ok { .. }))
    }
}

/// Routes queries to registered retrievers and fuses their answers.
#[derive(Clone)]
pub struct Orchestrator {
    registry: BTreeMap<Source, Arc<dyn Retriever>>,
    router: QueryRouter,
    config: RetrievalConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registered", &self.registered())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator with no retrievers registered.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if `config` fails validation.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: BTreeMap::new(),
            router: QueryRouter::new(config.recent_limit),
            config,
        })
    }

    /// Register `retriever` under the source it serves, replacing any
    /// previous registration for that source.
    pub fn register(&mut self, retriever: Arc<dyn Retriever>) {
        let source = retriever.source();
        if self.registry.insert(source, retriever).is_some() {
            tracing::debug!(%source, "replaced registered retriever");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.register(retriever);
        self
    }

    /// Sources that currently have a retriever.
    pub fn registered(&self) -> Vec<Source> {
        self.registry.keys().copied().collect()
    }

    /// The active configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Answer `query`: route it, query the planned backends concurrently,
    /// fuse and format.
    ///
    /// `hint` forces a routing mode; `None` lets the router classify the
    /// query text.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::EmptyQuery`] if `query` is blank. Backend
    /// failures are not errors; see [`QueryResponse::sources`].
    pub async fn answer(&self, query: &str, hint: Option<RouteMode>) -> Result<QueryResponse> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let plan = self.router.plan(query, hint);
        tracing::debug!(mode = %plan.mode, sources = ?plan.sources(), "dispatching sub-queries");

        let futures: Vec<_> = plan
            .sub_queries
            .iter()
            .map(|(source, sub_query)| {
                let limit = self.limit_for(plan.mode, *source);
                async move { (*source, self.retrieve_one(*source, sub_query, limit).await) }
            })
            .collect();
        let outcomes = futures::future::join_all(futures).await;

        let mut results = ResultSet::new();
        let mut sources = Vec::with_capacity(outcomes.len());
        for (source, outcome) in outcomes {
            let (candidates, status) = match outcome {
                Outcome::Ok(candidates) => {
                    tracing::debug!(%source, count = candidates.len(), "source returned candidates");
                    let count = candidates.len();
                    (candidates, SourceStatus::Ok { count })
                }
                Outcome::TimedOut => {
                    tracing::warn!(
                        %source,
                        timeout_ms = self.config.adapter_timeout_ms,
                        "source timed out"
                    );
                    (Vec::new(), SourceStatus::TimedOut)
                }
                Outcome::Failed(err) => {
                    tracing::warn!(%source, error = %err, "source query failed");
                    let status = SourceStatus::Failed {
                        kind: err.kind().to_owned(),
                        message: err.to_string(),
                    };
                    (Vec::new(), status)
                }
            };
            results.insert(source, candidates);
            sources.push(SourceReport { source, status });
        }

        let hits = fuse(&results, self.config.top_k);
        let text = format_context(&hits);
        Ok(QueryResponse {
            mode: plan.mode,
            results_html: to_html(&text),
            results: text,
            hits,
            sources,
        })
    }

    /// Candidate cap for one source. The recent-papers query asks for
    /// `recent_limit` rows, which the general cap must not cut short.
    fn limit_for(&self, mode: RouteMode, source: Source) -> usize {
        match (mode, source) {
            (RouteMode::Recent, Source::Relational) => {
                self.config.per_source_limit.max(self.config.recent_limit)
            }
            _ => self.config.per_source_limit,
        }
    }

    async fn retrieve_one(&self, source: Source, sub_query: &SubQuery, limit: usize) -> Outcome {
        let Some(retriever) = self.registry.get(&source) else {
            return Outcome::Failed(RetrievalError::unavailable(source, "no retriever registered"));
        };
        let call = retriever.retrieve(sub_query, limit);
        match tokio::time::timeout(self.config.adapter_timeout(), call).await {
            Ok(Ok(candidates)) => Outcome::Ok(candidates),
            Ok(Err(err)) => Outcome::Failed(err),
            Err(_) => Outcome::TimedOut,
        }
    }
}

enum Outcome {
    Ok(Vec<Candidate>),
    TimedOut,
    Failed(RetrievalError),
}
