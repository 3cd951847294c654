//! HTTP front end for the research assistant.
//!
//! ## Endpoints
//!
//! - `GET /query?q=...&mode=author|recent` - fused retrieval context
//! - `GET /answer?q=...` - retrieval context plus a generated answer
//! - `GET /health` - liveness probe
//! - `GET /` - minimal browser page

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use scholar_retrieval::{Orchestrator, QueryResponse, RetrievalError, RouteMode};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{Instrument, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{Result, ScholarError};
use crate::generation::AnswerGenerator;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Query-string parameters shared by `/query` and `/answer`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    /// The research question.
    #[serde(default)]
    pub q: Option<String>,
    /// Optional routing override (`author`, `recent`, `default`).
    #[serde(default)]
    pub mode: Option<String>,
}

/// `/answer` response: the retrieval response plus the generated text.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    /// Retrieval context and per-source outcomes.
    #[serde(flatten)]
    pub retrieval: QueryResponse,
    /// The generated answer.
    pub answer: String,
}

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    generator: Option<Arc<AnswerGenerator>>,
}

type ErrorReply = (StatusCode, Json<serde_json::Value>);

fn error_reply(status: StatusCode, message: impl Into<String>) -> ErrorReply {
    (status, Json(serde_json::json!({"error": message.into()})))
}

/// Build the application router.
pub fn router(orchestrator: Arc<Orchestrator>, generator: Option<Arc<AnswerGenerator>>) -> Router {
    let state = AppState {
        orchestrator,
        generator,
    };
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/query", get(handle_query))
        .route("/answer", get(handle_answer))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

/// Running HTTP server.
pub struct ScholarServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ScholarServer {
    /// Start the server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Server`] if the TCP listener cannot bind.
    pub async fn start(
        orchestrator: Arc<Orchestrator>,
        generator: Option<Arc<AnswerGenerator>>,
        config: &ServerConfig,
    ) -> Result<Self> {
        let app = router(orchestrator, generator);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ScholarError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ScholarError::Server(format!("failed to get local addr: {e}")))?;

        info!("scholar listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ScholarServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Give every request a fresh id, recorded in a span and echoed back.
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Validate the query string into a question and an optional mode hint.
fn parse_params(params: QueryParams) -> std::result::Result<(String, Option<RouteMode>), ErrorReply> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            "query parameter `q` must not be empty",
        ));
    }
    let hint = match params.mode.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<RouteMode>()
                .map_err(|e| error_reply(StatusCode::BAD_REQUEST, e))?,
        ),
    };
    Ok((query, hint))
}

async fn retrieve(
    state: &AppState,
    params: QueryParams,
) -> std::result::Result<(String, QueryResponse), ErrorReply> {
    let (query, hint) = parse_params(params)?;
    tracing::debug!(query = %query, ?hint, "handling query");
    match state.orchestrator.answer(&query, hint).await {
        Ok(response) => Ok((query, response)),
        Err(RetrievalError::EmptyQuery) => Err(error_reply(
            StatusCode::BAD_REQUEST,
            RetrievalError::EmptyQuery.to_string(),
        )),
        Err(e) => {
            tracing::error!(error = %e, "retrieval failed");
            Err(error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn handle_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Response {
    match retrieve(&state, params).await {
        Ok((_, response)) => (StatusCode::OK, Json(response)).into_response(),
        Err(reply) => reply.into_response(),
    }
}

async fn handle_answer(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Response {
    let Some(generator) = state.generator.clone() else {
        return error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "answer generation is not configured",
        )
        .into_response();
    };
    let (query, retrieval) = match retrieve(&state, params).await {
        Ok(ok) => ok,
        Err(reply) => return reply.into_response(),
    };
    match generator.generate(&retrieval.results, &query).await {
        Ok(answer) => (StatusCode::OK, Json(AnswerResponse { retrieval, answer })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "answer generation failed");
            error_reply(StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Scholar Research Assistant</title>
  </head>
  <body>
    <h2>Scholar Research Assistant</h2>
    <form id="query-form">
      <input type="text" id="query" placeholder="Type your research question..." size="50"/>
      <button type="submit">Ask</button>
    </form>
    <div id="answer" style="margin-top:20px;"></div>
    <script>
      document.getElementById('query-form').onsubmit = async function (e) {
        e.preventDefault();
        const out = document.getElementById('answer');
        const query = document.getElementById('query').value;
        out.innerText = 'Loading...';
        const res = await fetch('/query?q=' + encodeURIComponent(query));
        const data = await res.json();
        if (data.results_html) {
          out.innerHTML = data.results_html;
        } else if (data.error) {
          out.innerText = data.error;
        } else {
          out.innerText = 'No results.';
        }
      };
    </script>
  </body>
</html>
"#;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn blank_query_is_bad_request() {
        let (status, body) = parse_params(QueryParams {
            q: Some("   ".into()),
            mode: None,
        })
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0["error"].as_str().unwrap().contains("`q`"));
    }

    #[test]
    fn missing_query_is_bad_request() {
        assert!(parse_params(QueryParams::default()).is_err());
    }

    #[test]
    fn mode_parsed_case_insensitively() {
        let (query, hint) = parse_params(QueryParams {
            q: Some("graphs".into()),
            mode: Some("Recent".into()),
        })
        .unwrap();
        assert_eq!(query, "graphs");
        assert_eq!(hint, Some(RouteMode::Recent));
    }

    #[test]
    fn empty_mode_means_classify() {
        let (_, hint) = parse_params(QueryParams {
            q: Some("x".into()),
            mode: Some(String::new()),
        })
        .unwrap();
        assert_eq!(hint, None);
    }

    #[test]
    fn unknown_mode_rejected() {
        let (status, _) = parse_params(QueryParams {
            q: Some("x".into()),
            mode: Some("fastest".into()),
        })
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn index_page_fetches_query_endpoint() {
        assert!(INDEX_HTML.contains("fetch('/query?q='"));
    }
}
