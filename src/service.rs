//! Request/response API over both workflows
//!
//! Validates requests, runs a workflow, persists the turn to memory (multi
//! agent only) and stamps the total request latency into the stats.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::agent::MultiAgentWorkflow;
use crate::errors::{QaError, Result};
use crate::memory::MemoryService;
use crate::rag::{QaPath, QaWorkflow};
use crate::telemetry::TelemetryRecord;
use crate::types::{Citation, MetadataFilter, QueryContext, DEFAULT_SESSION_ID, DEFAULT_TOP_K, DEFAULT_USER_ID};

pub const MIN_QUESTION_CHARS: usize = 3;
pub const MAX_REQUEST_TOP_K: usize = 10;

/// Latency key for the whole request
pub const TOTAL_LATENCY_KEY: &str = "total";

/// Incoming question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata_filter: Option<MetadataFilter>,
}

impl QaRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Validate and turn into a query context
    ///
    /// With no filter given, only semantically chunked passages are searched.
    pub fn validate(&self) -> Result<QueryContext> {
        if self.question.trim().chars().count() < MIN_QUESTION_CHARS {
            return Err(QaError::InvalidRequest(format!(
                "question must be at least {} characters",
                MIN_QUESTION_CHARS
            )));
        }

        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if !(1..=MAX_REQUEST_TOP_K).contains(&top_k) {
            return Err(QaError::InvalidRequest(format!(
                "top_k must be between 1 and {}",
                MAX_REQUEST_TOP_K
            )));
        }

        let user_id = non_empty("user_id", self.user_id.as_deref(), DEFAULT_USER_ID)?;
        let session_id = non_empty("session_id", self.session_id.as_deref(), DEFAULT_SESSION_ID)?;

        let filter = self.metadata_filter.clone().unwrap_or_else(default_filter);

        Ok(QueryContext::new(self.question.clone())
            .with_top_k(top_k)
            .with_filter(Some(filter))
            .with_user(user_id)
            .with_session(session_id))
    }
}

fn non_empty(field: &str, value: Option<&str>, default: &str) -> Result<String> {
    match value {
        None => Ok(default.to_string()),
        Some(v) if v.trim().is_empty() => Err(QaError::InvalidRequest(format!("{} must not be empty", field))),
        Some(v) => Ok(v.to_string()),
    }
}

/// `{"chunk_strategy": "semantic"}`
pub fn default_filter() -> MetadataFilter {
    let mut filter = MetadataFilter::new();
    filter.insert("chunk_strategy".to_string(), Value::String("semantic".to_string()));
    filter
}

/// Multi-agent answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub plan: Vec<String>,
    pub attempts: usize,
    pub critique: Option<String>,
    pub done: bool,
    pub stats: TelemetryRecord,
}

/// Single-pass answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub path: QaPath,
    pub rewritten_question: Option<String>,
    pub retrieved: usize,
    pub stats: TelemetryRecord,
}

/// Entry point used by the CLI
pub struct QaService {
    qa: Arc<QaWorkflow>,
    multi: Arc<MultiAgentWorkflow>,
    memory: Arc<MemoryService>,
}

impl QaService {
    pub fn new(qa: Arc<QaWorkflow>, multi: Arc<MultiAgentWorkflow>, memory: Arc<MemoryService>) -> Self {
        Self { qa, multi, memory }
    }

    /// Plan/work/critic answer, then remember the turn
    pub async fn ask(&self, request: &QaRequest) -> Result<MultiAgentResponse> {
        let query = request.validate()?;
        let start = Instant::now();

        let outcome = self.multi.run(&query).await?;
        self.memory
            .remember_turn(&query.user_id, &query.session_id, &query.question, &outcome.answer)
            .await?;

        let mut stats = outcome.telemetry;
        stats
            .latency_ms
            .insert(TOTAL_LATENCY_KEY.to_string(), start.elapsed().as_millis() as u64);

        tracing::info!(
            attempts = outcome.attempts,
            done = outcome.done,
            termination = ?outcome.termination,
            "qa_multi_done"
        );

        Ok(MultiAgentResponse {
            answer: outcome.answer,
            citations: outcome.citations,
            plan: outcome.plan,
            attempts: outcome.attempts,
            critique: outcome.critique,
            done: outcome.done,
            stats,
        })
    }

    /// Single-pass answer; memory is neither read nor written
    pub async fn ask_single(&self, request: &QaRequest) -> Result<QaResponse> {
        let query = request.validate()?;
        let start = Instant::now();

        let outcome = self.qa.run(&query).await?;
        let retrieved = outcome.retrieved();

        let mut stats = outcome.telemetry;
        stats
            .latency_ms
            .insert(TOTAL_LATENCY_KEY.to_string(), start.elapsed().as_millis() as u64);

        Ok(QaResponse {
            answer: outcome.answer,
            citations: outcome.citations,
            path: outcome.path,
            rewritten_question: outcome.rewritten_question,
            retrieved,
            stats,
        })
    }
}
