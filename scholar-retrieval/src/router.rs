//! Query routing: classify a query and build per-backend sub-queries.
//!
//! Routing is a pure string transformation. It never fails and never does
//! I/O; checking that a sub-query is well formed is the adapter's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{Source, SubQuery};

/// Textual marker that routes a query to the author backends.
const AUTHOR_MARKER: &str = "author:";
/// Textual marker that routes a query to the recency backends.
const RECENT_MARKER: &str = "recent";

/// Graph lookup of papers written by an author whose name contains `$author`.
const AUTHOR_CYPHER: &str = "MATCH (a:Author)-[:AUTHORED]->(p:Paper) \
WHERE toLower(a.name) CONTAINS toLower($author) RETURN p, a";

/// Relational equivalent of [`AUTHOR_CYPHER`] over papers/paper_authors/authors.
const AUTHOR_SQL: &str = "SELECT p.arxiv_id, p.title, p.abstract, p.date_published, \
a.name AS author FROM papers p \
JOIN paper_authors pa ON p.id = pa.paper_id \
JOIN authors a ON pa.author_id = a.id \
WHERE lower(a.name) LIKE '%' || lower(:author) || '%'";

/// How a query is dispatched across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// Papers by a named author: graph + relational.
    Author,
    /// Most recently published papers: relational + keyword.
    Recent,
    /// Semantic question: vector + keyword.
    #[default]
    Default,
}

impl RouteMode {
    /// Returns the lowercase mode name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Recent => "recent",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for RouteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RouteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Self::Author),
            "recent" => Ok(Self::Recent),
            "default" | "" => Ok(Self::Default),
            other => Err(format!("unknown route mode: {other}")),
        }
    }
}

/// The router's output for one query: the mode plus the ordered list of
/// backends to consult and what each should execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// The routing decision.
    pub mode: RouteMode,
    /// Backends to query, in the order their results are fused.
    pub sub_queries: Vec<(Source, SubQuery)>,
}

impl QueryPlan {
    /// Backends named by this plan, in fusion order.
    pub fn sources(&self) -> Vec<Source> {
        self.sub_queries.iter().map(|(s, _)| *s).collect()
    }

    /// The sub-query for `source`, if the plan targets it.
    pub fn sub_query(&self, source: Source) -> Option<&SubQuery> {
        self.sub_queries
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, q)| q)
    }

    /// Whether `source` will be queried at all.
    pub fn targets(&self, source: Source) -> bool {
        self.sub_query(source).is_some()
    }
}

/// Builds [`QueryPlan`]s. Holds only the row count used for recency queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRouter {
    recent_limit: usize,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self { recent_limit: 10 }
    }
}

impl QueryRouter {
    /// Create a router whose recency queries return `recent_limit` rows.
    pub fn new(recent_limit: usize) -> Self {
        Self { recent_limit }
    }

    /// Route `query` given an optional explicit mode hint.
    pub fn plan(&self, query: &str, hint: Option<RouteMode>) -> QueryPlan {
        let mode = classify(query, hint);
        let sub_queries = match mode {
            RouteMode::Author => {
                let author = extract_author(query);
                vec![
                    (
                        Source::Graph,
                        SubQuery::text(AUTHOR_CYPHER).with_param("author", author.clone()),
                    ),
                    (
                        Source::Relational,
                        SubQuery::text(AUTHOR_SQL).with_param("author", author),
                    ),
                ]
            }
            RouteMode::Recent => vec![
                (Source::Relational, SubQuery::text(self.recent_sql())),
                (Source::Keyword, SubQuery::text(query)),
            ],
            RouteMode::Default => vec![
                (Source::Vector, SubQuery::text(query)),
                (Source::Keyword, SubQuery::text(query)),
            ],
        };
        tracing::trace!(%mode, sources = ?sub_queries.iter().map(|(s, _)| *s).collect::<Vec<_>>(), "query routed");
        QueryPlan { mode, sub_queries }
    }

    fn recent_sql(&self) -> String {
        format!(
            "SELECT arxiv_id, title, abstract, date_published FROM papers \
             ORDER BY date_published DESC LIMIT {}",
            self.recent_limit
        )
    }
}

/// Classify a query into a [`RouteMode`]. First match wins:
///
/// 1. an explicit hint
/// 2. a case-insensitive `author:` prefix
/// 3. a case-insensitive `recent` prefix
/// 4. [`RouteMode::Default`]
pub fn classify(query: &str, hint: Option<RouteMode>) -> RouteMode {
    if let Some(mode) = hint {
        return mode;
    }
    let trimmed = query.trim_start();
    if starts_with_ignore_case(trimmed, AUTHOR_MARKER) {
        RouteMode::Author
    } else if starts_with_ignore_case(trimmed, RECENT_MARKER) {
        RouteMode::Recent
    } else {
        RouteMode::Default
    }
}

/// Strip a leading `author:` marker (any case) and surrounding whitespace.
///
/// A query without the marker is taken to be the author name itself.
pub fn extract_author(query: &str) -> String {
    let trimmed = query.trim();
    let name = if starts_with_ignore_case(trimmed, AUTHOR_MARKER) {
        &trimmed[AUTHOR_MARKER.len()..]
    } else {
        trimmed
    };
    name.trim().to_owned()
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_prefix_targets_graph_and_relational_only() {
        let plan = QueryRouter::default().plan("author: Jane Doe", None);
        assert_eq!(plan.mode, RouteMode::Author);
        assert_eq!(plan.sources(), vec![Source::Graph, Source::Relational]);
        assert!(!plan.targets(Source::Vector));
        assert!(!plan.targets(Source::Keyword));

        let graph = plan.sub_query(Source::Graph).expect("graph sub-query");
        assert!(graph.text.contains("MATCH (a:Author)-[:AUTHORED]->(p:Paper)"));
        assert_eq!(graph.params.get("author").map(String::as_str), Some("Jane Doe"));

        let sql = plan.sub_query(Source::Relational).expect("sql sub-query");
        assert!(sql.text.contains("JOIN paper_authors pa"));
        assert!(sql.text.contains("lower(:author)"));
        assert_eq!(sql.params.get("author").map(String::as_str), Some("Jane Doe"));
    }

    #[test]
    fn author_prefix_is_case_insensitive() {
        let plan = QueryRouter::default().plan("AUTHOR:  Yoshua Bengio ", None);
        assert_eq!(plan.mode, RouteMode::Author);
        let graph = plan.sub_query(Source::Graph).expect("graph sub-query");
        assert_eq!(
            graph.params.get("author").map(String::as_str),
            Some("Yoshua Bengio")
        );
    }

    #[test]
    fn author_hint_uses_whole_query_as_name() {
        let plan = QueryRouter::default().plan("Geoffrey Hinton", Some(RouteMode::Author));
        assert_eq!(plan.mode, RouteMode::Author);
        let sql = plan.sub_query(Source::Relational).expect("sql sub-query");
        assert_eq!(
            sql.params.get("author").map(String::as_str),
            Some("Geoffrey Hinton")
        );
    }

    #[test]
    fn bare_author_marker_yields_degenerate_sub_query() {
        let plan = QueryRouter::default().plan("author:", None);
        assert_eq!(plan.mode, RouteMode::Author);
        let graph = plan.sub_query(Source::Graph).expect("graph sub-query");
        assert_eq!(graph.params.get("author").map(String::as_str), Some(""));
    }

    #[test]
    fn recent_prefix_targets_relational_then_keyword() {
        let plan = QueryRouter::new(25).plan("recent papers on diffusion", None);
        assert_eq!(plan.mode, RouteMode::Recent);
        assert_eq!(plan.sources(), vec![Source::Relational, Source::Keyword]);

        let sql = plan.sub_query(Source::Relational).expect("sql");
        assert!(sql.text.contains("ORDER BY date_published DESC LIMIT 25"));
        let keyword = plan.sub_query(Source::Keyword).expect("keyword");
        assert_eq!(keyword.text, "recent papers on diffusion");
    }

    #[test]
    fn default_targets_vector_and_keyword_with_raw_query() {
        let plan = QueryRouter::default().plan("attention is all you need", None);
        assert_eq!(plan.mode, RouteMode::Default);
        assert_eq!(plan.sources(), vec![Source::Vector, Source::Keyword]);
        for (_, sub) in &plan.sub_queries {
            assert_eq!(sub.text, "attention is all you need");
            assert!(sub.params.is_empty());
        }
    }

    #[test]
    fn hint_overrides_prefix() {
        let plan = QueryRouter::default().plan("author: Jane Doe", Some(RouteMode::Recent));
        assert_eq!(plan.mode, RouteMode::Recent);
    }

    #[test]
    fn routing_is_deterministic() {
        let router = QueryRouter::default();
        for (query, hint) in [
            ("author: Jane Doe", None),
            ("recent work", None),
            ("sparse attention", None),
            ("x", Some(RouteMode::Author)),
        ] {
            assert_eq!(router.plan(query, hint), router.plan(query, hint));
        }
    }

    #[test]
    fn prefix_check_handles_multibyte_input() {
        assert_eq!(classify("ñandú", None), RouteMode::Default);
        assert_eq!(classify("", None), RouteMode::Default);
        assert_eq!(extract_author("日本語"), "日本語");
    }

    #[test]
    fn route_mode_parses_tokens() {
        assert_eq!("Author".parse::<RouteMode>(), Ok(RouteMode::Author));
        assert_eq!("recent".parse::<RouteMode>(), Ok(RouteMode::Recent));
        assert_eq!("".parse::<RouteMode>(), Ok(RouteMode::Default));
        assert!("newest".parse::<RouteMode>().is_err());
    }
}
