//! Lexical grounding score and abstention
//!
//! # Formula
//!
//! ```text
//! T(s)  = { lowercase ASCII alphanumeric runs of s } \ STOPWORDS
//! score = |T(answer) ∩ T(context)| / |T(answer)|     (0 when T(answer) = ∅)
//! ```
//!
//! The stopwords include the tokens of "I don't know" so an abstention never
//! scores as grounded by accident.

use std::collections::HashSet;

/// Default threshold below which an answer counts as ungrounded
pub const DEFAULT_GROUNDING_THRESHOLD: f64 = 0.12;

const STOPWORDS: &[&str] = &[
    "i", "a", "an", "the", "and", "or", "to", "of", "in", "on", "for", "is", "are", "was", "were", "do", "don", "t",
    "not", "know",
];

const ABSTAIN_PREFIXES: &[&str] = &["i don't know", "i dont know"];

/// Content tokens of `text` (lowercased, stopwords removed)
pub fn content_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Fraction of answer tokens that also appear in the context, in `[0, 1]`
pub fn grounding_score(answer: &str, context: &str) -> f64 {
    let answer_tokens = content_tokens(answer);
    if answer_tokens.is_empty() {
        return 0.0;
    }
    let context_tokens = content_tokens(context);
    let overlap = answer_tokens.intersection(&context_tokens).count();
    overlap as f64 / answer_tokens.len() as f64
}

/// Whether the answer opens with a recognised abstention
pub fn is_abstain_answer(answer: &str) -> bool {
    let normalized = answer.trim().to_lowercase();
    ABSTAIN_PREFIXES.iter().any(|p| normalized.starts_with(p))
}

/// Decide abstention; an explicit abstention short-circuits with score 0
pub fn should_abstain(answer: &str, context: &str, threshold: f64) -> (bool, f64) {
    if is_abstain_answer(answer) {
        return (true, 0.0);
    }
    let score = grounding_score(answer, context);
    (score < threshold, score)
}
