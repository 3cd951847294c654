//! Integration tests for the full retrieval pipeline.
//!
//! These wire real backends (a seeded SQLite file, a flat vector index on
//! disk, and mock Elasticsearch / Neo4j servers) into an [`Orchestrator`]
//! and check routing, fusion and formatting end to end.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use scholar_retrieval::backends::{
    FlatIndex, GraphCredentials, GraphRetriever, HashingEmbedder, KeywordRetriever, Metadata,
    RelationalRetriever, VectorRetriever,
};
use scholar_retrieval::http::build_client;
use scholar_retrieval::{
    fuse, Candidate, Orchestrator, Payload, ResultSet, RetrievalConfig, RouteMode, Source,
    SourceStatus,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn seed_database(path: &std::path::Path) {
    let conn = Connection::open(path).expect("open");
    conn.execute_batch(
        "CREATE TABLE papers (id INTEGER PRIMARY KEY, arxiv_id TEXT UNIQUE, title TEXT,
            abstract TEXT, date_published TEXT);
         CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT UNIQUE);
         CREATE TABLE paper_authors (paper_id INTEGER, author_id INTEGER);
         INSERT INTO papers VALUES
            (1, '2301.00001', 'Sparse Attention', 'Sparse heads.', '2023-01-05'),
            (2, '2402.00002', 'Graph Transformers', 'Graphs meet attention.', '2024-02-10'),
            (3, '2405.00003', 'Retrieval Fusion', 'Merging sources.', '2024-05-20');
         INSERT INTO authors VALUES (1, 'Jane Doe'), (2, 'John Roe');
         INSERT INTO paper_authors VALUES (1, 1), (3, 1), (2, 2);",
    )
    .expect("seed");
}

fn client() -> reqwest::Client {
    build_client(Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn author_route_merges_graph_and_relational() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("research.db");
    seed_database(&db);

    let neo4j = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/neo4j/tx/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "columns": ["p", "a"],
                "data": [{"row": [
                    {"arxiv_id": "2405.00003", "title": "Retrieval Fusion"},
                    {"name": "Jane Doe"}
                ]}]
            }],
            "errors": []
        })))
        .expect(1)
        .mount(&neo4j)
        .await;

    let graph = GraphRetriever::new(
        client(),
        &GraphCredentials {
            uri: neo4j.uri(),
            user: "neo4j".into(),
            password: "password".into(),
            database: "neo4j".into(),
        },
    )
    .expect("graph");
    let relational = RelationalRetriever::new(&format!("sqlite://{}", db.display()));

    let orchestrator = Orchestrator::new(RetrievalConfig::default())
        .expect("config")
        .with_retriever(Arc::new(graph))
        .with_retriever(Arc::new(relational));

    let response = orchestrator.answer("author: jane doe", None).await.expect("answer");

    assert_eq!(response.mode, RouteMode::Author);
    assert_eq!(response.sources[0].status, SourceStatus::Ok { count: 1 });
    assert_eq!(response.sources[1].status, SourceStatus::Ok { count: 2 });
    // 2405.00003 comes from both stores and is kept once.
    assert_eq!(response.hits.len(), 2);
    let keys: Vec<_> = response
        .hits
        .iter()
        .filter_map(|c| c.identity_key.as_deref())
        .collect();
    assert_eq!(keys, vec!["2405.00003", "2301.00001"]);
    assert!(response.results.starts_with("[1] "));
    assert!(response.results.contains("\n\n[2] "));
}

#[tokio::test]
async fn recent_route_orders_by_publication_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("research.db");
    seed_database(&db);

    let es = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/papers/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {"hits": [{"_id": "x", "_score": 2.0, "_source": {
                "arxiv_id": "2402.00002", "title": "Graph Transformers", "abstract": "Graphs meet attention."
            }}]}
        })))
        .mount(&es)
        .await;

    let orchestrator = Orchestrator::new(RetrievalConfig::default())
        .expect("config")
        .with_retriever(Arc::new(RelationalRetriever::new(&db.display().to_string())))
        .with_retriever(Arc::new(
            KeywordRetriever::new(client(), &es.uri(), "papers").expect("keyword"),
        ));

    let response = orchestrator.answer("recent transformers", None).await.expect("answer");

    assert_eq!(response.mode, RouteMode::Recent);
    // The keyword hit duplicates a relational row and is dropped; the
    // remaining unscored rows keep the newest-first order.
    assert_eq!(response.hits.len(), 3);
    assert!(response.hits.iter().all(|c| c.source == Source::Relational));
    let keys: Vec<_> = response
        .hits
        .iter()
        .filter_map(|c| c.identity_key.as_deref())
        .collect();
    assert_eq!(keys, vec!["2405.00003", "2402.00002", "2301.00001"]);
}

#[tokio::test]
async fn default_route_uses_vector_index_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let embedder = HashingEmbedder::new(32);
    let titles = ["sparse attention heads", "graph transformers", "retrieval fusion"];
    let vectors: Vec<Vec<f32>> = titles.iter().map(|t| embedder.embed_sync(t)).collect();

    let index_path = dir.path().join("faiss.index.json");
    let meta_path = dir.path().join("faiss_meta.json");
    std::fs::write(
        &index_path,
        serde_json::to_string(&FlatIndex::new(32, vectors).expect("index")).expect("json"),
    )
    .expect("write index");
    std::fs::write(
        &meta_path,
        json!([
            {"arxiv_id": "a", "title": "Sparse Attention Heads", "abstract": "A"},
            {"arxiv_id": "b", "title": "Graph Transformers", "abstract": "B"},
            {"arxiv_id": "c", "title": "Retrieval Fusion", "abstract": "C"}
        ])
        .to_string(),
    )
    .expect("write meta");

    let vector = VectorRetriever::open(&index_path, Some(&meta_path), Arc::new(embedder))
        .expect("open");
    let orchestrator = Orchestrator::new(RetrievalConfig {
        top_k: 2,
        ..Default::default()
    })
    .expect("config")
    .with_retriever(Arc::new(vector));

    let response = orchestrator.answer("graph transformers", None).await.expect("answer");

    assert_eq!(response.mode, RouteMode::Default);
    assert_eq!(response.hits.len(), 2);
    assert!(response.results.starts_with("[1] Graph Transformers\nB\n"));
    // Keyword backend is not registered and is reported as such.
    assert!(matches!(response.sources[1].status, SourceStatus::Failed { .. }));
}

#[tokio::test]
async fn backend_local_ids_do_not_merge_across_sources() {
    let embedder = HashingEmbedder::new(8);
    let index = FlatIndex::new(8, vec![embedder.embed_sync("attention")]).expect("index");
    let vector = VectorRetriever::new(index, Metadata::default(), Arc::new(embedder));

    let es = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/papers/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {"hits": [{"_id": "0", "_score": 4.0, "_source": {
                "title": "A Different Paper", "abstract": "Unrelated."
            }}]}
        })))
        .mount(&es)
        .await;

    let orchestrator = Orchestrator::new(RetrievalConfig::default())
        .expect("config")
        .with_retriever(Arc::new(vector))
        .with_retriever(Arc::new(
            KeywordRetriever::new(client(), &es.uri(), "papers").expect("keyword"),
        ));

    let response = orchestrator.answer("attention", None).await.expect("answer");

    // Vector row 0 and search document "0" are different papers.
    assert_eq!(response.hits.len(), 2);
    let mut keys: Vec<_> = response
        .hits
        .iter()
        .filter_map(|c| c.identity_key.as_deref())
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["keyword#0", "vector#0"]);
    assert!(response.results.contains("A Different Paper"));
}

#[test]
fn metadata_loaded_from_map_form() {
    let meta = Metadata::new(json!({"0": {"title": "zero"}}));
    assert_eq!(meta.get(0), Some(&json!({"title": "zero"})));
}

#[test]
fn fusion_properties_hold_for_mixed_input() {
    let mut vector_payload = Payload::new();
    vector_payload.insert("metadata".into(), json!({"title": "V"}));
    let results = ResultSet::new()
        .with(
            Source::Vector,
            vec![
                Candidate::new(Source::Vector, vector_payload.clone())
                    .with_identity("a")
                    .with_score(0.9),
                Candidate::new(Source::Vector, vector_payload)
                    .with_identity("b")
                    .with_score(0.5),
            ],
        )
        .with(
            Source::Keyword,
            vec![
                Candidate::new(Source::Keyword, Payload::new())
                    .with_identity("a")
                    .with_score(12.0),
                Candidate::new(Source::Keyword, Payload::new()).with_score(f64::NAN),
                Candidate::new(Source::Keyword, Payload::new()),
            ],
        );

    let fused = fuse(&results, 10);

    // Identity "a" kept once, from the first source; the two payload-less
    // keyword hits share a fingerprint and collapse as well.
    assert_eq!(fused.len(), 3);
    assert!(fused.len() <= results.total_len());
    let scores: Vec<f64> = fused.iter().map(|c| c.score.unwrap_or(0.0)).collect();
    assert_eq!(scores[0], 0.9);
    assert_eq!(scores[1], 0.5);
    // NaN never equals itself, so compare scores bit for bit.
    let summary = |f: &scholar_retrieval::FusedResult| -> Vec<_> {
        f.iter()
            .map(|c| (c.identity_key.clone(), c.source, c.score.map(f64::to_bits)))
            .collect()
    };
    assert_eq!(summary(&fuse(&results, 10)), summary(&fused));
}
