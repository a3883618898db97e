//! Bounded context assembly for chat prompts.

use crate::document::SearchResult;

/// Chunks are truncated into the context only when more than this many tokens remain.
pub const MIN_TRUNCATED_TOKENS: usize = 50;

/// Character-count token heuristic: `chars / chars_per_token`, rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimator {
    chars_per_token: usize,
}

impl TokenEstimator {
    /// Estimator with the given ratio; zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    /// Characters counted as one token.
    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }

    /// Estimated tokens in `text`.
    pub fn estimate(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token
    }

    /// Characters that fit in `tokens`.
    pub fn chars_for(&self, tokens: usize) -> usize {
        tokens.saturating_mul(self.chars_per_token)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Context handed to the chat provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltContext {
    /// `[File: id]` blocks joined by blank lines.
    pub text: String,
    /// Chunks included, counting a truncated one.
    pub chunks_used: usize,
    /// Estimated tokens of the included chunk content.
    pub estimated_tokens: usize,
    /// Whether the last included chunk was cut short.
    pub truncated: bool,
}

impl BuiltContext {
    /// True when no chunk was included.
    pub fn is_empty(&self) -> bool {
        self.chunks_used == 0
    }
}

/// Packs ranked chunks into a token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    max_tokens: usize,
    estimator: TokenEstimator,
}

impl ContextBuilder {
    /// Builder with a token budget and estimator.
    pub fn new(max_tokens: usize, estimator: TokenEstimator) -> Self {
        Self {
            max_tokens,
            estimator,
        }
    }

    /// Token budget.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Add chunks in rank order while the running estimate stays within the budget.
    ///
    /// The first chunk that would overflow is cut to the remaining allowance and suffixed with
    /// `...` when more than [`MIN_TRUNCATED_TOKENS`] remain; assembly stops at that chunk.
    pub fn build(&self, chunks: &[SearchResult]) -> BuiltContext {
        let mut parts = Vec::new();
        let mut used = 0;
        let mut truncated = false;

        for chunk in chunks {
            let tokens = self.estimator.estimate(&chunk.content);

            if used + tokens > self.max_tokens {
                let remaining = self.max_tokens - used;
                if remaining > MIN_TRUNCATED_TOKENS {
                    let cut: String = chunk
                        .content
                        .chars()
                        .take(self.estimator.chars_for(remaining))
                        .collect();
                    used += self.estimator.estimate(&cut);
                    parts.push(format!("[File: {}]\n{cut}...", chunk.file_id));
                    truncated = true;
                }
                break;
            }

            parts.push(format!("[File: {}]\n{}", chunk.file_id, chunk.content));
            used += tokens;
        }

        BuiltContext {
            chunks_used: parts.len(),
            text: parts.join("\n\n"),
            estimated_tokens: used,
            truncated,
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(3000, TokenEstimator::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use proptest::prelude::*;

    fn chunk(file_id: &str, content: String) -> SearchResult {
        SearchResult {
            file_id: file_id.into(),
            score: 1.0,
            content,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn chunks_within_budget_are_joined() {
        let builder = ContextBuilder::default();
        let context = builder.build(&[
            chunk("a", "first".into()),
            chunk("b", "second".into()),
        ]);
        assert_eq!(context.text, "[File: a]\nfirst\n\n[File: b]\nsecond");
        assert_eq!(context.chunks_used, 2);
        assert!(!context.truncated);
    }

    #[test]
    fn overflowing_chunk_is_truncated_when_allowance_is_large() {
        let builder = ContextBuilder::default();
        let context = builder.build(&[
            chunk("a", "x".repeat(8_000)),
            chunk("b", "y".repeat(8_000)),
            chunk("c", "z".repeat(100)),
        ]);

        assert_eq!(context.chunks_used, 2);
        assert!(context.truncated);
        let expected_tail = format!("[File: b]\n{}...", "y".repeat(4_000));
        assert!(context.text.ends_with(&expected_tail));
        assert!(!context.text.contains("[File: c]"));
        assert_eq!(context.estimated_tokens, 3_000);
    }

    #[test]
    fn small_allowance_stops_without_truncating() {
        let builder = ContextBuilder::default();
        let context = builder.build(&[
            chunk("a", "x".repeat(11_800)),
            chunk("b", "y".repeat(1_000)),
        ]);

        assert_eq!(context.chunks_used, 1);
        assert!(!context.truncated);
        assert_eq!(context.text, format!("[File: a]\n{}", "x".repeat(11_800)));
    }

    #[test]
    fn allowance_of_exactly_fifty_is_not_used() {
        let builder = ContextBuilder::new(100, TokenEstimator::new(4));
        let context = builder.build(&[
            chunk("a", "x".repeat(200)),
            chunk("b", "y".repeat(400)),
        ]);
        assert_eq!(context.chunks_used, 1);
    }

    #[test]
    fn exact_fit_is_included() {
        let builder = ContextBuilder::new(10, TokenEstimator::new(4));
        let context = builder.build(&[chunk("a", "x".repeat(40))]);
        assert_eq!(context.chunks_used, 1);
        assert_eq!(context.estimated_tokens, 10);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let builder = ContextBuilder::new(60, TokenEstimator::new(1));
        let context = builder.build(&[chunk("a", "é".repeat(100))]);
        assert_eq!(context.text, format!("[File: a]\n{}...", "é".repeat(60)));
    }

    #[test]
    fn empty_input_builds_empty_context() {
        let context = ContextBuilder::default().build(&[]);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
    }

    #[test]
    fn estimator_treats_zero_ratio_as_one() {
        let estimator = TokenEstimator::new(0);
        assert_eq!(estimator.chars_per_token(), 1);
        assert_eq!(estimator.estimate("abcd"), 4);
    }

    proptest! {
        #[test]
        fn context_never_exceeds_budget(
            lengths in proptest::collection::vec(0usize..6_000, 0..12),
            max_tokens in 0usize..4_000,
            chars_per_token in 1usize..8,
        ) {
            let chunks: Vec<_> = lengths
                .iter()
                .enumerate()
                .map(|(idx, len)| chunk(&format!("f{idx}"), "a".repeat(*len)))
                .collect();
            let builder = ContextBuilder::new(max_tokens, TokenEstimator::new(chars_per_token));
            let context = builder.build(&chunks);

            prop_assert!(context.estimated_tokens <= max_tokens);
            prop_assert!(context.chunks_used <= chunks.len());
            if context.truncated {
                prop_assert!(context.text.ends_with("..."));
            }
        }
    }
}
