//! Fetch a web page, turn it into markdown, and compress it with an LLM when
//! it does not fit a token budget.
//!
//! `websum` is built around a **budget-aware summarization controller**. A
//! page is fetched and normalized to markdown; if its token count is within
//! the configured output budget it is returned verbatim, otherwise it is sent
//! to an OpenAI-compatible chat-completions endpoint with an extraction
//! prompt. Before that call the prompt is fitted inside the model's context
//! window, truncating the page at a token boundary when necessary.
//!
//! # Getting started
//!
//! ```ignore
//! use websum::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebsumError> {
//!     let config = Config::new("http://localhost:8085/v1")
//!         .with_max_output_tokens(2048)
//!         .with_max_context_tokens(32_768);
//!
//!     let controller = Controller::from_config(config)?;
//!     let text = controller
//!         .process("https://example.com/docs", Some("installation steps"))
//!         .await?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Token limits and truncation:** [`BudgetCalculator`](context::budget::BudgetCalculator)
//!   and its constants [`SAFETY_MARGIN`](context::budget::SAFETY_MARGIN) and
//!   [`TOKENIZER_SLACK_TOKENS`](context::tokens::TOKENIZER_SLACK_TOKENS).
//! - **Prompt wording:** [`PromptBuilder`](context::prompt::PromptBuilder).
//! - **The completion call:** [`Summarizer`](context::summarizer::Summarizer)
//!   on top of [`CompletionClient`].
//! - **Page retrieval and HTML conversion:** [`fetch`].
//! - **Orchestration and cancellation:** [`Controller`](controller::Controller).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`Config`](config::Config), environment loading and validation |
//! | [`context`] | Tokenizer adapter, prompt builder, budget calculator, summarizer |
//! | [`fetch`] | [`Fetcher`](fetch::Fetcher) trait, HTTP fetcher, markdown normalizer |
//! | [`controller`] | fetch → normalize → budget → summarize |
//! | [`error`] | [`WebsumError`](error::WebsumError), [`ConfigError`](error::ConfigError) |

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod prelude;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{Result, Stage, WebsumError};

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Always serialized: omitting it would let the server pick its own default.
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

/// Role of a message in the conversation. The extraction prompt is always
/// sent as a single user turn.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

/// A chat message.
#[derive(Serialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: Option<RawResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`CompletionClient::chat`].
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
}

impl ChatCompletion {
    /// Whether generation stopped at the `max_tokens` cap rather than on its own.
    pub fn hit_length_limit(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions API.
///
/// Issues exactly one request per [`chat`](Self::chat) call; there is no
/// retry. Cheap to clone.
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CompletionClient {
    /// Create a client for `{base_url}/chat/completions`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("websum/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a chat completion request and return the first choice's text.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={:?}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(WebsumError::UpstreamError {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion(&text)
    }

    fn transport_error(&self, e: reqwest::Error) -> WebsumError {
        if e.is_timeout() {
            WebsumError::Timeout {
                stage: Stage::Completion,
                after: self.timeout,
            }
        } else {
            WebsumError::CompletionUnreachable(e.to_string())
        }
    }
}

/// Extract the first choice's message text from a 2xx response body.
fn parse_completion(text: &str) -> Result<ChatCompletion> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| WebsumError::MalformedResponse(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(WebsumError::MalformedResponse(format!(
            "API error: {}",
            err.message
        )));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let choice = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| WebsumError::MalformedResponse("no choices in response".into()))?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| WebsumError::MalformedResponse("first choice has no message content".into()))?;

    debug!("LLM output: {} chars", content.len());

    Ok(ChatCompletion {
        content,
        finish_reason: choice.finish_reason,
        usage: parsed.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_always_serializes_temperature() {
        let req = ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"  Summary \n"},"finish_reason":"stop"},
                      {"message":{"content":"ignored"}}],
                      "usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.content, "Summary");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(12));
    }

    #[test]
    fn length_finish_is_detected() {
        let cut = parse_completion(r#"{"choices":[{"message":{"content":"partial"},"finish_reason":"length"}]}"#)
            .unwrap();
        assert!(cut.hit_length_limit());

        let clean = parse_completion(r#"{"choices":[{"message":{"content":"done"},"finish_reason":"stop"}]}"#)
            .unwrap();
        assert!(!clean.hit_length_limit());

        let unknown = parse_completion(r#"{"choices":[{"message":{"content":"done"}}]}"#).unwrap();
        assert!(!unknown.hit_length_limit());
    }

    #[test]
    fn empty_choices_are_malformed() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, WebsumError::MalformedResponse(_)));
    }

    #[test]
    fn missing_content_is_malformed() {
        for body in [
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"finish_reason":"stop"}]}"#,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
            r#"{}"#,
        ] {
            let err = parse_completion(body).unwrap_err();
            assert!(
                matches!(err, WebsumError::MalformedResponse(_)),
                "{body} gave {err}"
            );
        }
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_completion("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, WebsumError::MalformedResponse(_)));
    }

    #[test]
    fn error_object_is_reported() {
        let err = parse_completion(r#"{"error":{"message":"model not loaded"}}"#).unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client =
            CompletionClient::new("http://localhost:8085/v1/", None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8085/v1/chat/completions");
    }
}
