//! Telemetry for workflow runs
//!
//! Each workflow threads one [`TelemetryRecord`] through its nodes:
//! ordered step names, per-step latency, per-step token usage, and a few
//! namespaces. A sub-workflow's record is embedded wholesale under
//! `sub.<key>` so its step names can never overwrite the outer ones.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::types::TokenUsage;

/// Key under which the single-pass QA record is nested
pub const RAG_SUB_KEY: &str = "rag";

/// Memory loaded by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub short_count: usize,
    pub long_count: usize,
}

/// Guardrail outcomes for the last worker pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailStats {
    pub top_k: usize,
    pub memory_lines_used: usize,
    pub chunks_used: usize,
    pub grounding_score: f64,
    pub abstained: bool,
}

/// Evaluation harness timing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    pub elapsed_ms: u64,
}

/// Per-invocation telemetry record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Step names in execution order; a retried step appears again
    #[serde(default)]
    pub steps: Vec<String>,
    /// Step → elapsed milliseconds (last write wins)
    #[serde(default)]
    pub latency_ms: BTreeMap<String, u64>,
    /// Step → token usage, only for steps whose backend reported it
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<GuardrailStats>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub: BTreeMap<String, TelemetryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalStats>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage for a step if the backend reported any
    pub fn record_tokens(&mut self, step: &str, usage: Option<TokenUsage>) {
        if let Some(usage) = usage {
            self.tokens.insert(step.to_string(), usage);
        }
    }

    /// Memory namespace, created on first access
    pub fn memory_mut(&mut self) -> &mut MemoryStats {
        self.memory.get_or_insert_with(MemoryStats::default)
    }

    /// Guardrails namespace, created on first access
    pub fn guardrails_mut(&mut self) -> &mut GuardrailStats {
        self.guardrails.get_or_insert_with(GuardrailStats::default)
    }

    /// Eval namespace, created on first access
    pub fn eval_mut(&mut self) -> &mut EvalStats {
        self.eval.get_or_insert_with(EvalStats::default)
    }

    /// Embed a sub-workflow record under `key`, replacing any previous one
    pub fn embed_sub(&mut self, key: &str, record: TelemetryRecord) {
        self.sub.insert(key.to_string(), record);
    }

    /// Nested record for `key`, if present
    pub fn sub(&self, key: &str) -> Option<&TelemetryRecord> {
        self.sub.get(key)
    }

    /// Sum of total tokens across this record and every nested record
    pub fn total_tokens(&self) -> u64 {
        let own: u64 = self.tokens.values().map(|u| u64::from(u.total_tokens)).sum();
        own + self.sub.values().map(TelemetryRecord::total_tokens).sum::<u64>()
    }
}

/// In-flight timing for one step
#[derive(Debug)]
pub struct StepTimer {
    step: String,
    start: Instant,
}

impl StepTimer {
    pub fn step(&self) -> &str {
        &self.step
    }
}

/// Append `step` to the record and start its clock
pub fn start_timing(record: &mut TelemetryRecord, step: &str) -> StepTimer {
    record.steps.push(step.to_string());
    StepTimer {
        step: step.to_string(),
        start: Instant::now(),
    }
}

/// Stop the clock and write the elapsed milliseconds
pub fn finish_timing(record: &mut TelemetryRecord, timer: StepTimer) -> u64 {
    let elapsed = timer.start.elapsed().as_millis() as u64;
    record.latency_ms.insert(timer.step, elapsed);
    elapsed
}

/// Terminal summary of a telemetry record
pub struct TelemetryDisplay<'a> {
    record: &'a TelemetryRecord,
    verbosity: crate::cli::Verbosity,
}

impl<'a> TelemetryDisplay<'a> {
    /// Create a new display
    pub fn new(record: &'a TelemetryRecord, verbosity: crate::cli::Verbosity) -> Self {
        Self { record, verbosity }
    }

    /// Render the summary as lines (no trailing newline)
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("{}", "📊 Run Summary".bold()));
        lines.push("─────────────────────────────────────".to_string());
        Self::render_record(self.record, "", &mut lines);

        if let Some(total) = self.record.latency_ms.get("total") {
            lines.push(format!("Total latency:     {} ms", total));
        }
        lines.push(format!("Total tokens:      {}", self.record.total_tokens()));

        if let Some(memory) = &self.record.memory {
            lines.push(format!(
                "Memory:            {} short / {} long",
                memory.short_count, memory.long_count
            ));
        }

        if let Some(guard) = &self.record.guardrails {
            let abstained = if guard.abstained {
                "abstained".yellow().to_string()
            } else {
                "answered".green().to_string()
            };
            lines.push(format!(
                "Guardrails:        top_k={} chunks={} grounding={:.2} {}",
                guard.top_k, guard.chunks_used, guard.grounding_score, abstained
            ));
        }

        if self.verbosity.show_details() {
            for (key, sub) in &self.record.sub {
                lines.push(format!("{}", format!("sub.{}", key).cyan()));
                Self::render_record(sub, "  ", &mut lines);
            }
        }

        lines
    }

    fn render_record(record: &TelemetryRecord, indent: &str, lines: &mut Vec<String>) {
        for step in &record.steps {
            let latency = record
                .latency_ms
                .get(step)
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "-".to_string());
            let tokens = record
                .tokens
                .get(step)
                .map(|u| format!(" ({} tokens)", u.total_tokens))
                .unwrap_or_default();
            lines.push(format!("{}{:<18} {}{}", indent, step, latency, tokens.dimmed()));
        }
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        if self.verbosity.is_quiet() {
            return;
        }
        println!();
        for line in self.render() {
            println!("{}", line);
        }
        println!();
    }
}
