//! Budget calculator: decides between pass-through and summarization, and
//! fits the summarization prompt inside the model's context window.
//!
//! The decision runs in two phases:
//!
//! 1. **Threshold.** Content that already fits the caller's output budget
//!    (`max_output_tokens`) is returned untouched. Nothing else is computed.
//! 2. **Fit.** Otherwise the static prompt overhead is measured by rendering
//!    the template with an empty document, and the content is truncated at a
//!    token boundary to whatever the safe context limit leaves over. The real
//!    prompt is then rendered and counted; if tokenizer slack pushed it over
//!    the window, the content budget shrinks by the overflow and the fit is
//!    retried, at most [`MAX_FIT_ATTEMPTS`] times.
//!
//! The safe limit reserves `max(ceil(window × SAFETY_MARGIN), TOKENIZER_SLACK_TOKENS)`
//! tokens: the percentage dominates for large windows, the fixed floor for
//! small ones.

use tracing::{debug, warn};

use super::prompt::PromptBuilder;
use super::tokens::{TOKENIZER_SLACK_TOKENS, TokenCounter};
use crate::config::Config;
use crate::error::{Result, WebsumError};

/// Fraction of the context window held back for tokenizer mismatch.
pub const SAFETY_MARGIN: f64 = 0.02;

/// Upper bound on render-count-shrink rounds before giving up.
pub const MAX_FIT_ATTEMPTS: usize = 4;

/// Context window minus the safety reserve.
pub fn safe_context_limit(max_context_tokens: usize) -> usize {
    let percentage = (max_context_tokens as f64 * SAFETY_MARGIN).ceil() as usize;
    max_context_tokens.saturating_sub(percentage.max(TOKENIZER_SLACK_TOKENS))
}

/// Normalized page text with its token count.
///
/// The count is always computed from `text`; truncation produces a new unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    pub text: String,
    pub token_count: usize,
}

impl ContentUnit {
    pub fn measure(text: impl Into<String>, tokenizer: &dyn TokenCounter) -> Self {
        let text = text.into();
        let token_count = tokenizer.count_tokens(&text);
        Self { text, token_count }
    }
}

/// Record of a lossy cut made to fit the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    pub original_tokens: usize,
    pub kept_tokens: usize,
}

impl Truncation {
    pub fn dropped_tokens(&self) -> usize {
        self.original_tokens.saturating_sub(self.kept_tokens)
    }
}

/// A rendered prompt whose token count has been checked against the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationRequest {
    pub prompt: String,
    pub prompt_token_count: usize,
}

/// Everything the summarization client needs for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizePlan {
    /// The (possibly truncated) content that went into the prompt.
    pub content: ContentUnit,
    pub request: SummarizationRequest,
    /// `Some` when the content was cut to fit.
    pub truncation: Option<Truncation>,
}

/// Outcome of the budget calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Content fits the output budget; return it as-is.
    PassThrough(String),
    /// Content must be compressed by the model.
    Summarize(SummarizePlan),
}

/// Applies the configured token limits to a piece of content.
pub struct BudgetCalculator<'a> {
    tokenizer: &'a dyn TokenCounter,
    prompt: &'a PromptBuilder,
    max_output_tokens: usize,
    max_context_tokens: usize,
}

impl<'a> BudgetCalculator<'a> {
    pub fn new(tokenizer: &'a dyn TokenCounter, prompt: &'a PromptBuilder, config: &Config) -> Self {
        Self {
            tokenizer,
            prompt,
            max_output_tokens: config.max_output_tokens,
            max_context_tokens: config.max_context_tokens,
        }
    }

    /// Decide what to do with `content`.
    ///
    /// Returns [`WebsumError::BudgetExhausted`] when the static prompt leaves
    /// no room for content, or when no fitting prompt was found within
    /// [`MAX_FIT_ATTEMPTS`].
    pub fn decide(&self, content: ContentUnit, context: Option<&str>) -> Result<Decision> {
        if content.token_count <= self.max_output_tokens {
            return Ok(Decision::PassThrough(content.text));
        }

        let static_tokens = self
            .tokenizer
            .count_tokens(&self.prompt.static_prompt(context));
        let safe_limit = safe_context_limit(self.max_context_tokens);
        let exhausted = || WebsumError::BudgetExhausted {
            static_tokens,
            safe_limit,
        };

        let mut budget = safe_limit
            .checked_sub(static_tokens)
            .filter(|b| *b > 0)
            .ok_or_else(exhausted)?;
        debug!(
            "Budget: {} content tokens, {} static tokens, {} of {} context tokens available",
            content.token_count, static_tokens, budget, self.max_context_tokens
        );

        let mut kept: Option<ContentUnit> = None;
        for attempt in 1..=MAX_FIT_ATTEMPTS {
            // Later rounds cut the previous prefix, not the whole page.
            let source = kept.as_ref().unwrap_or(&content);
            if source.token_count > budget {
                let text = self.tokenizer.truncate_to_tokens(&source.text, budget);
                kept = Some(ContentUnit::measure(text, self.tokenizer));
            }
            let current = kept.as_ref().unwrap_or(&content);

            let prompt = self.prompt.build(&current.text, context);
            let prompt_tokens = self.tokenizer.count_tokens(&prompt);
            if prompt_tokens <= self.max_context_tokens {
                let truncation = kept.as_ref().map(|k| Truncation {
                    original_tokens: content.token_count,
                    kept_tokens: k.token_count,
                });
                if let Some(t) = truncation {
                    warn!(
                        "Content truncated from {} to {} tokens ({} dropped) to fit a {}-token context window",
                        t.original_tokens,
                        t.kept_tokens,
                        t.dropped_tokens(),
                        self.max_context_tokens
                    );
                }
                return Ok(Decision::Summarize(SummarizePlan {
                    content: kept.unwrap_or(content),
                    request: SummarizationRequest {
                        prompt,
                        prompt_token_count: prompt_tokens,
                    },
                    truncation,
                }));
            }

            let overflow = prompt_tokens - self.max_context_tokens;
            budget = current.token_count.min(budget).saturating_sub(overflow.max(1));
            debug!(
                "Fit attempt {attempt}: prompt is {prompt_tokens} tokens ({overflow} over); \
                 shrinking content budget to {budget}"
            );
            if budget == 0 {
                break;
            }
        }

        Err(exhausted())
    }
}
