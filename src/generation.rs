//! Answer generation over the retrieved context.
//!
//! Sends the formatted context and the user's question to an
//! OpenAI-compatible `/chat/completions` endpoint as a single user message.

use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, ScholarError};

/// Text placed between the context block and the question.
const QUESTION_PREFIX: &str = "\n\nAnswer the following question: ";

/// Build the generation prompt for `query` over `context`.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!("{context}{QUESTION_PREFIX}{query}")
}

/// OpenAI-compatible chat completion client.
#[derive(Clone)]
pub struct AnswerGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AnswerGenerator {
    /// Create a generator for the API rooted at `api_url` (e.g.
    /// `https://api.openai.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] if `api_url` is not a valid URL.
    pub fn new(client: reqwest::Client, api_url: &str, model: &str) -> Result<Self> {
        let url = scholar_retrieval::http::base_url(api_url)
            .and_then(|base| base.join("chat/completions"))
            .map_err(|e| ScholarError::Config(format!("invalid generation url {api_url:?}: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_owned(),
            api_key: None,
        })
    }

    /// Send `key` as a bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The completion endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Answer `query` from `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Generation`] if the API cannot be reached,
    /// answers with an error status, or returns no message content.
    pub async fn generate(&self, context: &str, query: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": build_prompt(context, query)}]
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScholarError::Generation(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(300).collect();
            return Err(ScholarError::Generation(format!("HTTP {status}: {excerpt}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ScholarError::Generation(format!("malformed response: {e}")))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ScholarError::Generation("response had no message content".into()))?;
        tracing::debug!(chars = answer.len(), "answer generated");
        Ok(answer)
    }
}
