//! Process-wide configuration, loaded once at startup.
//!
//! [`Config`] is read-only for the lifetime of the process and is shared
//! between concurrent requests behind an `Arc`. Load it with
//! [`Config::from_env`] (or [`Config::from_lookup`] in tests) so that a
//! missing `BASE_URL` fails before the first request arrives.

use std::time::Duration;

use crate::error::ConfigError;

/// API key value that means "send no Authorization header".
pub const NO_KEY_REQUIRED: &str = "no-key-required";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 4096;
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 32_768;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the fetch-and-summarize pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API, without the trailing
    /// `/chat/completions` (e.g. `http://localhost:8085/v1`).
    pub completion_endpoint_base: String,
    /// Bearer token. `None` sends no Authorization header.
    pub api_key: Option<String>,
    /// Model identifier sent with each completion request. Default: `"gpt-3.5-turbo"`.
    pub model_name: String,
    /// Pass-through threshold and cap on generated tokens. Default: `4096`.
    pub max_output_tokens: usize,
    /// Context window of the summarization model. Default: `32768`.
    pub max_context_tokens: usize,
    /// Deadline for the completion call. Default: 120 s.
    pub request_timeout: Duration,
    /// Deadline for fetching the page. Default: 30 s.
    pub fetch_timeout: Duration,
    /// Largest page body accepted. Default: 5 MiB.
    pub max_response_bytes: usize,
    /// Decoding temperature. Default: `0.0`.
    pub temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_endpoint_base: String::new(),
            api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            temperature: 0.0,
        }
    }
}

impl Config {
    /// Create a config pointing at the given completion endpoint base URL.
    pub fn new(completion_endpoint_base: impl Into<String>) -> Self {
        Self {
            completion_endpoint_base: normalize_base(&completion_endpoint_base.into()),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = normalize_key(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.completion_endpoint_base)
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Unset and empty variables fall back to defaults, except `BASE_URL`
    /// which is mandatory. Numeric values must parse and be positive.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base = var("BASE_URL").ok_or(ConfigError::Missing("BASE_URL"))?;
        let mut config = Config::new(base);

        if let Some(key) = var("API_KEY") {
            config = config.with_api_key(key);
        }
        if let Some(model) = var("MODEL") {
            config.model_name = model.trim().to_string();
        }
        if let Some(v) = var("MAX_TOKENS") {
            config.max_output_tokens = parse_count("MAX_TOKENS", &v)?;
        }
        if let Some(v) = var("MAX_CONTEXT_LENGTH") {
            config.max_context_tokens = parse_count("MAX_CONTEXT_LENGTH", &v)?;
        }
        if let Some(v) = var("SUMMARIZER_TIMEOUT") {
            config.request_timeout = parse_seconds("SUMMARIZER_TIMEOUT", &v)?;
        }
        if let Some(v) = var("FETCH_TIMEOUT") {
            config.fetch_timeout = parse_seconds("FETCH_TIMEOUT", &v)?;
        }
        if let Some(v) = var("MAX_RESPONSE_BYTES") {
            config.max_response_bytes = parse_count("MAX_RESPONSE_BYTES", &v)?;
        }
        if let Some(v) = var("TEMPERATURE") {
            config.temperature = v
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or(ConfigError::Invalid {
                    name: "TEMPERATURE",
                    value: v.clone(),
                })?;
        }

        Ok(config)
    }

    /// Check the invariants a hand-built config must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion_endpoint_base.trim().is_empty() {
            return Err(ConfigError::Missing("BASE_URL"));
        }
        let counts = [
            ("MAX_TOKENS", self.max_output_tokens),
            ("MAX_CONTEXT_LENGTH", self.max_context_tokens),
            ("MAX_RESPONSE_BYTES", self.max_response_bytes),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: "0".into(),
                });
            }
        }
        let timeouts = [
            ("SUMMARIZER_TIMEOUT", self.request_timeout),
            ("FETCH_TIMEOUT", self.fetch_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    name,
                    value: "0".into(),
                });
            }
        }
        Ok(())
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn normalize_key(key: String) -> Option<String> {
    let key = key.trim();
    if key.is_empty() || key == NO_KEY_REQUIRED {
        None
    } else {
        Some(key.to_string())
    }
}

fn parse_count(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}

fn parse_seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}
