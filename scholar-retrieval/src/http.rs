//! Shared HTTP plumbing for the network backends.
//!
//! Provides a configured [`reqwest::Client`] and the mapping from HTTP
//! failures to the retrieval error taxonomy: transport failures and 5xx
//! responses mean the backend is unavailable, 4xx responses mean it
//! rejected the query.

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::RetrievalError;
use crate::types::Source;

/// User-Agent sent to every backend.
const USER_AGENT: &str = concat!("scholar-retrieval/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for backend requests.
///
/// # Errors
///
/// Returns [`RetrievalError::Config`] if the client cannot be constructed.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, RetrievalError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RetrievalError::Config(format!("failed to build HTTP client: {e}")))
}

/// Parse `raw` as a base URL that relative paths can be joined onto.
///
/// A trailing slash is added to the path so `Url::join` appends rather
/// than replacing the last segment.
pub fn base_url(raw: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Map a transport-level [`reqwest::Error`] for `source`.
pub fn transport_error(source: Source, err: &reqwest::Error) -> RetrievalError {
    if err.is_decode() {
        RetrievalError::query(source, format!("malformed response: {err}"))
    } else {
        RetrievalError::unavailable(source, err.to_string())
    }
}

/// Map a non-success HTTP status for `source`, keeping a short body excerpt.
pub fn status_error(source: Source, status: StatusCode, body: &str) -> RetrievalError {
    let excerpt: String = body.chars().take(300).collect();
    let message = format!("HTTP {status}: {excerpt}");
    if status.is_client_error()
        && status != StatusCode::UNAUTHORIZED
        && status != StatusCode::FORBIDDEN
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        RetrievalError::query(source, message)
    } else {
        RetrievalError::unavailable(source, message)
    }
}
