//! Request orchestration: fetch → normalize → budget → summarize.
//!
//! A [`Controller`] is built once from a [`Config`] and shared across
//! concurrent requests. Each call runs the stages in order and stops at the
//! first failure; nothing is retried.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::config::Config;
use crate::context::{
    BudgetCalculator, Cl100kTokenizer, ContentUnit, Decision, Summarizer, TokenCounter, Truncation,
};
use crate::error::{Result, WebsumError};
use crate::fetch::{self, FetchedPage, Fetcher, HttpFetcher};

/// What the controller did with the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The normalized page fit the output budget and was returned verbatim.
    PassThrough,
    /// The page was sent to the model. `truncation` is set when it had to be
    /// cut to fit the context window first.
    Summarized { truncation: Option<Truncation> },
}

/// Result text plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub text: String,
    pub outcome: Outcome,
}

/// Fetches a URL and returns its content within the configured token budget.
///
/// Cheap to clone; all state is behind `Arc`s and read-only.
#[derive(Clone)]
pub struct Controller {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    tokenizer: Arc<dyn TokenCounter>,
    summarizer: Summarizer,
}

impl Controller {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        tokenizer: Arc<dyn TokenCounter>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            tokenizer,
            summarizer,
        }
    }

    /// Wire up the HTTP fetcher, the cl100k tokenizer and the completion
    /// client.
    pub fn from_config(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config)
            .map_err(|e| WebsumError::HttpClient(e.to_string()))?;
        let summarizer =
            Summarizer::from_config(&config).map_err(|e| WebsumError::HttpClient(e.to_string()))?;
        let tokenizer = Cl100kTokenizer::new()?;
        Ok(Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(tokenizer),
            summarizer,
        ))
    }

    /// Replace the token counter.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn TokenCounter>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Fetch `url` and return either its markdown or a summary of it.
    pub async fn process(&self, url: &str, context: Option<&str>) -> Result<String> {
        self.process_detailed(url, context).await.map(|p| p.text)
    }

    /// Like [`process`](Self::process), but also reports whether the content
    /// was passed through, summarized, or truncated and summarized.
    pub async fn process_detailed(&self, url: &str, context: Option<&str>) -> Result<Processed> {
        let span = info_span!("process", url = %url);
        self.run(url, context).instrument(span).await
    }

    /// Like [`process_detailed`](Self::process_detailed), but gives up with
    /// [`WebsumError::Cancelled`] as soon as `cancel` fires. The in-flight
    /// HTTP request is dropped.
    pub async fn process_with_cancel(
        &self,
        url: &str,
        context: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Processed> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Request for {url} cancelled");
                Err(WebsumError::Cancelled)
            }
            result = self.process_detailed(url, context) => result,
        }
    }

    async fn run(&self, url: &str, context: Option<&str>) -> Result<Processed> {
        let page = self.fetcher.fetch(url).await?;
        let (content_tokens, decision) = self.plan(page, context).await?;

        match decision {
            Decision::PassThrough(text) => {
                info!(
                    "Passing through {content_tokens} tokens (limit {})",
                    self.config.max_output_tokens
                );
                Ok(Processed {
                    text,
                    outcome: Outcome::PassThrough,
                })
            }
            Decision::Summarize(plan) => {
                info!(
                    "Content is {content_tokens} tokens, over the {}-token limit; summarizing",
                    self.config.max_output_tokens
                );
                let text = self.summarizer.send(&plan.request).await?;
                Ok(Processed {
                    text,
                    outcome: Outcome::Summarized {
                        truncation: plan.truncation,
                    },
                })
            }
        }
    }

    /// Normalize, measure and fit the page on the blocking pool.
    ///
    /// Tokenizing a multi-megabyte page takes seconds; on the async workers
    /// it would stall other requests and delay cancellation.
    async fn plan(&self, page: FetchedPage, context: Option<&str>) -> Result<(usize, Decision)> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let config = Arc::clone(&self.config);
        let prompt = self.summarizer.prompt_builder().clone();
        let context = context.map(str::to_string);

        tokio::task::spawn_blocking(move || -> Result<(usize, Decision)> {
            let content = ContentUnit::measure(fetch::normalize(page)?, tokenizer.as_ref());
            let content_tokens = content.token_count;
            let decision = BudgetCalculator::new(tokenizer.as_ref(), &prompt, &config)
                .decide(content, context.as_deref())?;
            Ok((content_tokens, decision))
        })
        .await
        .map_err(|e| WebsumError::BudgetTask(e.to_string()))?
    }
}
