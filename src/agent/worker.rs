//! Worker agent
//!
//! One worker pass: load memory, fold it into the question, run the
//! single-pass QA workflow, then apply the output guardrails.

use std::sync::Arc;

use crate::errors::Result;
use crate::guardrails::{
    clamp_top_k, sanitize_chunks, should_abstain, trim_chunks_by_budget, trim_memory_lines, GuardrailConfig,
};
use crate::memory::{MemoryHit, MemoryMessage, MemoryService};
use crate::rag::{QaPath, QaRunner};
use crate::telemetry::{GuardrailStats, MemoryStats, TelemetryRecord};
use crate::types::{Citation, QueryContext};

/// Answer substituted when the grounding check fails with no passages left
pub const INSUFFICIENT_SOURCES_ANSWER: &str = "I don't know based on the provided sources.";

const SHORT_TERM_HEADER: &str = "SHORT-TERM CHAT HISTORY (most recent):";
const LONG_TERM_HEADER: &str = "LONG-TERM RELEVANT MEMORIES:";

/// Result of one worker pass
#[derive(Debug, Clone)]
pub struct WorkOutput {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Passages left after sanitizing and budget trimming
    pub retrieved: usize,
    pub path: QaPath,
    pub rewritten_question: Option<String>,
    pub memory: MemoryStats,
    pub guardrails: GuardrailStats,
    /// Telemetry of the QA run, nested by the caller
    pub rag_telemetry: TelemetryRecord,
}

/// Worker agent: memory + QA workflow + guardrails
pub struct Worker {
    qa: Arc<dyn QaRunner>,
    memory: Arc<MemoryService>,
    guardrails: GuardrailConfig,
}

impl Worker {
    pub fn new(qa: Arc<dyn QaRunner>, memory: Arc<MemoryService>, guardrails: GuardrailConfig) -> Self {
        Self { qa, memory, guardrails }
    }

    pub async fn work(&self, query: &QueryContext) -> Result<WorkOutput> {
        let top_k = clamp_top_k(query.top_k as i64, self.guardrails.max_top_k);

        let short_term = self.memory.load_short_term(&query.session_id).await?;
        let long_term = self.memory.load_long_term(&query.user_id, &query.question).await?;
        let memory = MemoryStats {
            short_count: short_term.len(),
            long_count: long_term.len(),
        };

        let memory_lines = trim_memory_lines(
            &memory_lines(&short_term, &long_term),
            self.guardrails.memory_max_lines,
            self.guardrails.memory_max_line_chars,
        );
        let question = augment_question(&query.question, &memory_lines);

        let sub_query = QueryContext {
            question,
            top_k,
            ..query.clone()
        };
        let outcome = self.qa.run_qa(&sub_query).await?;

        let chunks = sanitize_chunks(outcome.passages);
        let chunks = trim_chunks_by_budget(chunks, self.guardrails.max_context_chars, self.guardrails.min_chunks);

        let docs_context = chunks
            .iter()
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let (abstained, grounding_score) =
            should_abstain(&outcome.answer, &docs_context, self.guardrails.grounding_threshold);

        let answer = if abstained && chunks.is_empty() {
            INSUFFICIENT_SOURCES_ANSWER.to_string()
        } else {
            outcome.answer
        };

        let guardrails = GuardrailStats {
            top_k,
            memory_lines_used: memory_lines.len(),
            chunks_used: chunks.len(),
            grounding_score,
            abstained,
        };

        Ok(WorkOutput {
            answer,
            citations: outcome.citations,
            retrieved: chunks.len(),
            path: outcome.path,
            rewritten_question: outcome.rewritten_question,
            memory,
            guardrails,
            rag_telemetry: outcome.telemetry,
        })
    }
}

fn memory_lines(short_term: &[MemoryMessage], long_term: &[MemoryHit]) -> Vec<String> {
    let mut lines = Vec::new();

    if !short_term.is_empty() {
        lines.push(SHORT_TERM_HEADER.to_string());
        for m in short_term {
            lines.push(format!("{}: {}", m.role.as_str().to_uppercase(), m.content));
        }
    }

    if !long_term.is_empty() {
        lines.push(LONG_TERM_HEADER.to_string());
        for (i, hit) in long_term.iter().enumerate() {
            lines.push(format!("[M{}] {}", i + 1, hit.text));
        }
    }

    lines
}

/// Append the memory block to the question when there is one
fn augment_question(question: &str, memory_lines: &[String]) -> String {
    let block = memory_lines.join("\n");
    let block = block.trim();
    if block.is_empty() {
        return question.to_string();
    }
    format!(
        "{}\n\n---\nMEMORY CONTEXT (use only if relevant):\n{}\n---",
        question, block
    )
}
