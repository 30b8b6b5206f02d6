//! Deterministic guardrails applied around generation
//!
//! Pure functions, composed in this order by the worker:
//! clamp → trim context → sanitize → score.

pub mod budgets;
pub mod grounding;
pub mod injection;

pub use budgets::{clamp_top_k, clamp_top_k_str, trim_chunks_by_budget, trim_memory_lines};
pub use grounding::{grounding_score, is_abstain_answer, should_abstain};
pub use injection::{sanitize_chunks, sanitize_text};

use serde::{Deserialize, Serialize};

/// Tunable guardrail limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Upper bound for the worker's top_k
    pub max_top_k: usize,
    /// Character budget for retrieved context
    pub max_context_chars: usize,
    /// Passages always kept regardless of budget
    pub min_chunks: usize,
    /// Grounding score below which an answer counts as ungrounded
    pub grounding_threshold: f64,
    /// Memory lines injected into the question
    pub memory_max_lines: usize,
    pub memory_max_line_chars: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_top_k: budgets::DEFAULT_MAX_TOP_K,
            max_context_chars: budgets::DEFAULT_MAX_CONTEXT_CHARS,
            min_chunks: budgets::DEFAULT_MIN_CHUNKS,
            grounding_threshold: grounding::DEFAULT_GROUNDING_THRESHOLD,
            memory_max_lines: 10,
            memory_max_line_chars: budgets::DEFAULT_MAX_LINE_CHARS,
        }
    }
}
