//! Query text normalization and tokenization
//!
//! Shared by the sparse index, the hash embedder, the overlap scorer and
//! the snippet highlighter so all of them agree on what a term is.

use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;

/// NFKC-fold, trim, collapse internal whitespace and lowercase.
pub fn normalize_query(text: &str) -> String {
    let folded: String = text.nfkc().collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split into lowercase alphanumeric terms of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Term frequencies for a token list, in a stable order.
pub fn term_counts(tokens: &[String]) -> BTreeMap<&str, f32> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}
