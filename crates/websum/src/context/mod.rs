//! Context window management for the summarization call.
//!
//! The model's context window is a hard budget. This module owns every
//! piece of arithmetic that keeps the request inside it:
//!
//! 1. **[`tokens`]** — [`TokenCounter`] counts tokens and truncates at token
//!    boundaries, with a documented re-encoding slack.
//!
//! 2. **[`prompt`]** — [`PromptBuilder`] renders the extraction prompt. Pure,
//!    so the empty-document rendering measures the static overhead.
//!
//! 3. **[`budget`]** — [`BudgetCalculator`] decides pass-through vs.
//!    summarize and fits the prompt within the window.
//!
//! 4. **[`summarizer`]** — [`Summarizer`] sends the fitted prompt to the
//!    completion endpoint.

pub mod budget;
pub mod prompt;
pub mod summarizer;
pub mod tokens;

// Re-export commonly used items at the module level.
pub use budget::{
    BudgetCalculator, ContentUnit, Decision, SAFETY_MARGIN, SummarizationRequest, SummarizePlan,
    Truncation, safe_context_limit,
};
pub use prompt::PromptBuilder;
pub use summarizer::{Summarizer, SummarizerConfig};
pub use tokens::{Cl100kTokenizer, TOKENIZER_SLACK_TOKENS, TokenCounter};
