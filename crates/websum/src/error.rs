//! Error types for every stage of a fetch-and-summarize request.
//!
//! [`WebsumError`] is the single error channel the
//! [`Controller`](crate::controller::Controller) reports to its caller.
//! [`ConfigError`] is only produced at startup while loading
//! [`Config`](crate::config::Config).

use std::time::Duration;
use thiserror::Error;

/// Which network operation exceeded its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Retrieving the web resource.
    Fetch,
    /// Waiting for the chat-completion endpoint.
    Completion,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Completion => write!(f, "summarization"),
        }
    }
}

#[derive(Error, Debug)]
pub enum WebsumError {
    #[error("URL must start with http:// or https:// (got '{0}')")]
    InvalidUrl(String),

    /// Network failure, non-2xx status, or oversized body from the page fetch.
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("failed to convert HTML to markdown: {0}")]
    Normalize(String),

    /// The static prompt alone does not fit the context window. Never retried.
    #[error(
        "context length too small to fit the prompt instructions: \
         {static_tokens} static tokens against a safe limit of {safe_limit} tokens"
    )]
    BudgetExhausted {
        static_tokens: usize,
        safe_limit: usize,
    },

    #[error("summarization API HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("summarization API unreachable: {0}")]
    CompletionUnreachable(String),

    #[error("invalid response from summarization API: {0}")]
    MalformedResponse(String),

    #[error("{stage} timed out after {:.1}s", after.as_secs_f64())]
    Timeout { stage: Stage, after: Duration },

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The blocking task that measures and fits the content panicked.
    #[error("budget calculation failed: {0}")]
    BudgetTask(String),
}

impl WebsumError {
    /// The one-line text surfaced to a tool caller.
    pub fn user_message(&self) -> String {
        format!("Error fetching URL: {self}")
    }

    /// Whether the error is a misconfiguration rather than a transient fault.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, WebsumError::BudgetExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, WebsumError>;

/// Startup configuration failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required (e.g., http://localhost:8085/v1)")]
    Missing(&'static str),

    #[error("{name} must be a positive number (got '{value}')")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_wraps_error_text() {
        let err = WebsumError::UpstreamError {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(
            err.user_message(),
            "Error fetching URL: summarization API HTTP 500: boom"
        );
    }

    #[test]
    fn timeout_names_the_stage() {
        let err = WebsumError::Timeout {
            stage: Stage::Completion,
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "summarization timed out after 1.5s");
    }

    #[test]
    fn only_budget_exhaustion_is_configuration() {
        assert!(
            WebsumError::BudgetExhausted {
                static_tokens: 150,
                safe_limit: 46
            }
            .is_configuration_error()
        );
        assert!(!WebsumError::Cancelled.is_configuration_error());
    }
}
