//! Offline evaluation harness
//!
//! JSONL cases in, per-case pass/fail with abstention and grounding
//! diagnostics out, plus a JSON report.

pub mod runner;
pub mod types;

pub use runner::{fail_reasons, is_abstain, load_cases, EvalRunner, EvalSummary, EVAL_TOP_K};
pub use types::{EvalCase, EvalResult};
