//! Token counting and token-boundary truncation.
//!
//! Every budget decision in this crate is made in tokens, so counting and
//! truncation sit behind the [`TokenCounter`] trait. The default
//! implementation, [`Cl100kTokenizer`], uses the `cl100k_base` BPE vocabulary
//! shared by most OpenAI-compatible chat models.
//!
//! # Boundary slack
//!
//! [`TokenCounter::truncate_to_tokens`] cuts the *token sequence* and decodes
//! the prefix. Re-encoding that prefix on its own can yield a slightly
//! different count, because BPE merges across the cut are re-evaluated and a
//! cut inside a multi-byte character has to back off to the previous
//! character. The difference is bounded by [`TOKENIZER_SLACK_TOKENS`], which
//! the budget calculator reserves on top of its percentage margin.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::WebsumError;

/// Upper bound on how far a re-encoded truncation may drift from the
/// requested token count.
pub const TOKENIZER_SLACK_TOKENS: usize = 4;

/// Counts tokens and truncates text at token boundaries.
///
/// Implementations must be deterministic and monotonic in text length: a
/// prefix never counts more tokens than the text it was cut from (up to
/// [`TOKENIZER_SLACK_TOKENS`]).
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Longest prefix of `text` that ends on a token boundary and holds at
    /// most `max_tokens` tokens. Returns `text` unchanged if it already fits.
    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String;
}

/// [`TokenCounter`] backed by the `cl100k_base` encoding.
///
/// Uses ordinary encoding, so strings such as `<|endoftext|>` appearing in a
/// web page are counted as plain text. Cheap to clone.
#[derive(Clone)]
pub struct Cl100kTokenizer {
    bpe: Arc<CoreBPE>,
}

impl Cl100kTokenizer {
    pub fn new() -> Result<Self, WebsumError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| WebsumError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl std::fmt::Debug for Cl100kTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cl100kTokenizer")
    }
}

impl TokenCounter for Cl100kTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        // A cut that splits a multi-byte character does not decode; step
        // back one token at a time until it does.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(prefix) = self.bpe.decode(tokens[..end].to_vec()) {
                return prefix;
            }
            end -= 1;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Cl100kTokenizer {
        Cl100kTokenizer::new().unwrap()
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(tokenizer().count_tokens(""), 0);
    }

    #[test]
    fn short_text_counts_a_few_tokens() {
        let count = tokenizer().count_tokens("Hello world");
        assert!((1..=3).contains(&count), "got {count}");
    }

    #[test]
    fn count_grows_with_length() {
        let t = tokenizer();
        let short = "The quick brown fox. ".repeat(10);
        let long = "The quick brown fox. ".repeat(100);
        assert!(t.count_tokens(&long) > t.count_tokens(&short));
    }

    #[test]
    fn truncation_respects_budget_after_recount() {
        let t = tokenizer();
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(200);
        for n in [0, 1, 7, 50, 333, 1000] {
            let cut = t.truncate_to_tokens(&text, n);
            assert!(text.starts_with(&cut));
            assert!(
                t.count_tokens(&cut) <= n + TOKENIZER_SLACK_TOKENS,
                "n={n} recount={}",
                t.count_tokens(&cut)
            );
        }
    }

    #[test]
    fn truncation_to_zero_is_empty() {
        assert_eq!(tokenizer().truncate_to_tokens("some text", 0), "");
    }

    #[test]
    fn text_within_budget_is_unchanged() {
        let t = tokenizer();
        let text = "already short";
        assert_eq!(t.truncate_to_tokens(text, 100), text);
    }

    #[test]
    fn truncation_never_splits_multibyte_characters() {
        let t = tokenizer();
        let text = "日本語のテキストと絵文字 🦀🦀🦀 ".repeat(50);
        for n in 1..40 {
            let cut = t.truncate_to_tokens(&text, n);
            assert!(text.starts_with(&cut), "n={n} produced a non-prefix");
        }
    }

    #[test]
    fn truncation_is_stable_on_repeat() {
        let t = tokenizer();
        let text = "alpha beta gamma delta ".repeat(100);
        let once = t.truncate_to_tokens(&text, 64);
        let twice = t.truncate_to_tokens(&once, 64);
        assert_eq!(once, twice);
    }
}
