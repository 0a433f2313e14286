//! Word tokenizer shared by indexing, query analysis, and diversification.
//!
//! Tokens are maximal runs of alphanumeric characters or underscores,
//! lowercased. No stemming: "cat" and "cats" are different terms.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through",
    "during", "before", "after", "above", "below", "between", "under", "again", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "each", "few", "more", "most",
    "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
    "very", "just", "and", "but", "if", "or", "because", "until", "while", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "i", "my", "me", "we", "our", "you",
    "your", "he", "she", "it", "they", "them", "his", "her", "its", "their", "please", "tell",
    "about",
];

/// Split text into lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tokenize and drop repeats, keeping first-occurrence order.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// The distinct tokens of a text, for set-similarity comparisons.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Whether a lowercase token is an English stop word.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Distinct non-stop-word tokens in first-occurrence order.
pub fn keywords(text: &str) -> Vec<String> {
    tokenize_unique(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}
