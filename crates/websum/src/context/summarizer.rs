//! One-shot summarization through the completion endpoint.
//!
//! [`Summarizer`] renders the extraction prompt, sends it as a single user
//! message with a pinned decoding temperature, and returns the first
//! choice's text. Failures are reported as-is; retry policy belongs to the
//! caller.

use std::time::Duration;

use tracing::{info, warn};

use super::budget::SummarizationRequest;
use super::prompt::PromptBuilder;
use crate::config::Config;
use crate::error::Result;
use crate::{ChatRequest, CompletionClient, Message};

/// Settings for the completion call.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    /// Sent as `max_tokens` to cap the generated output.
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl SummarizerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model_name.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            timeout: config.request_timeout,
        }
    }
}

/// Sends prompts to the summarization model.
#[derive(Clone)]
pub struct Summarizer {
    client: CompletionClient,
    prompt: PromptBuilder,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(client: CompletionClient, config: SummarizerConfig) -> Self {
        Self {
            prompt: PromptBuilder::new(config.max_output_tokens),
            client,
            config,
        }
    }

    /// Build the HTTP client and prompt from a loaded [`Config`].
    pub fn from_config(config: &Config) -> std::result::Result<Self, reqwest::Error> {
        let client = CompletionClient::new(
            &config.completion_endpoint_base,
            config.api_key.clone(),
            config.request_timeout,
        )?;
        Ok(Self::new(client, SummarizerConfig::from_config(config)))
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompt
    }

    /// Render the prompt for `text` and send it.
    ///
    /// Does no budgeting: callers that need the context-window guarantee go
    /// through the [`BudgetCalculator`](super::budget::BudgetCalculator) and
    /// [`send`](Self::send) the request it verified.
    pub async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String> {
        self.complete(self.prompt.build(text, context)).await
    }

    /// Send an already-fitted request.
    pub async fn send(&self, request: &SummarizationRequest) -> Result<String> {
        info!(
            "Summarizing with {} ({} prompt tokens)",
            self.config.model, request.prompt_token_count
        );
        self.complete(request.prompt.clone()).await
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: Some(self.config.max_output_tokens),
        };
        let completion = self.client.chat(&body).await?;
        if completion.hit_length_limit() {
            warn!(
                "Summary stopped at the {}-token output limit and may be incomplete",
                self.config.max_output_tokens
            );
        }
        Ok(completion.content)
    }
}
