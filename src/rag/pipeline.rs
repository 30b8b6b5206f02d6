// Single-pass QA workflow: retrieve → assess → {answer | rewrite → retrieve2 → answer}
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agent::state::{QaEvent, QaNode};
use crate::backends::GenerationBackend;
use crate::errors::{QaError, Result};
use crate::rag::context::ContextBuilder;
use crate::rag::retrieval::RetrievalSelector;
use crate::telemetry::{finish_timing, start_timing, TelemetryRecord};
use crate::types::{Citation, MetadataFilter, Passage, QueryContext, TokenUsage};

/// Answer returned when nothing was retrieved
pub const NO_DOCUMENTS_ANSWER: &str = "I don't know based on the provided documents.";

/// Default relevance keywords
pub const DEFAULT_KEYWORDS: &[&str] = &["agent", "agents", "tool", "tools", "langgraph", "planner", "executor"];

/// Rewrite log preview length
const LOG_REWRITE_CHARS: usize = 120;

/// QA workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Domain keywords for the relevance check
    pub keywords: Vec<String>,
    /// Minimum passages for relevance when the question has no keyword
    pub min_passages: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_passages: 2,
        }
    }
}

/// Which route the workflow took
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaPath {
    #[default]
    Direct,
    Rewrite,
}

impl QaPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaPath::Direct => "direct",
            QaPath::Rewrite => "rewrite",
        }
    }
}

/// Canonical QA workflow state
#[derive(Debug, Clone, Default)]
pub struct QaState {
    pub question: String,
    pub top_k: usize,
    pub metadata_filter: Option<MetadataFilter>,
    pub rewritten_question: Option<String>,
    pub passages: Vec<Passage>,
    pub retrieval_ok: Option<bool>,
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
    pub path: QaPath,
    pub telemetry: TelemetryRecord,
}

/// Partial update returned by one node
#[derive(Debug, Clone)]
pub enum QaUpdate {
    Retrieved(Vec<Passage>),
    Assessed { ok: bool },
    Rewritten { query: String, usage: Option<TokenUsage> },
    Answered {
        answer: String,
        citations: Vec<Citation>,
        usage: Option<TokenUsage>,
    },
}

impl QaUpdate {
    /// Event this update emits on the graph
    pub fn event(&self) -> QaEvent {
        match self {
            QaUpdate::Retrieved(_) => QaEvent::Retrieved,
            QaUpdate::Assessed { ok: true } => QaEvent::RelevanceOk,
            QaUpdate::Assessed { ok: false } => QaEvent::RelevanceLow,
            QaUpdate::Rewritten { .. } => QaEvent::Rewritten,
            QaUpdate::Answered { .. } => QaEvent::Answered,
        }
    }

    fn usage(&self) -> Option<TokenUsage> {
        match self {
            QaUpdate::Rewritten { usage, .. } | QaUpdate::Answered { usage, .. } => *usage,
            _ => None,
        }
    }
}

impl QaState {
    /// Fresh state for one invocation
    pub fn new(query: &QueryContext) -> Self {
        Self {
            question: query.question.clone(),
            top_k: query.top_k,
            metadata_filter: query.metadata_filter.clone(),
            ..Default::default()
        }
    }

    /// Merge a node's update; new values override
    pub fn apply(&mut self, update: QaUpdate) {
        match update {
            QaUpdate::Retrieved(passages) => self.passages = passages,
            QaUpdate::Assessed { ok } => self.retrieval_ok = Some(ok),
            QaUpdate::Rewritten { query, .. } => {
                self.rewritten_question = Some(query);
                self.path = QaPath::Rewrite;
            }
            QaUpdate::Answered { answer, citations, .. } => {
                self.answer = Some(answer);
                self.citations = citations;
            }
        }
    }
}

/// Result of one QA invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaOutcome {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub path: QaPath,
    pub rewritten_question: Option<String>,
    /// Passages behind the answer
    pub passages: Vec<Passage>,
    pub telemetry: TelemetryRecord,
}

impl QaOutcome {
    /// Number of passages behind the answer
    pub fn retrieved(&self) -> usize {
        self.passages.len()
    }
}

impl From<QaState> for QaOutcome {
    fn from(state: QaState) -> Self {
        Self {
            answer: state.answer.unwrap_or_else(|| NO_DOCUMENTS_ANSWER.to_string()),
            citations: state.citations,
            path: state.path,
            rewritten_question: state.rewritten_question,
            passages: state.passages,
            telemetry: state.telemetry,
        }
    }
}

/// Single-pass retrieve/assess/rewrite/answer workflow
pub struct QaWorkflow {
    selector: RetrievalSelector,
    generator: Arc<dyn GenerationBackend>,
    context_builder: ContextBuilder,
    config: QaConfig,
}

impl QaWorkflow {
    /// Create new workflow with default configuration
    pub fn new(selector: RetrievalSelector, generator: Arc<dyn GenerationBackend>) -> Self {
        Self::with_config(selector, generator, QaConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(selector: RetrievalSelector, generator: Arc<dyn GenerationBackend>, config: QaConfig) -> Self {
        Self {
            selector,
            generator,
            context_builder: ContextBuilder::new(),
            config,
        }
    }

    /// Run the graph to completion
    pub async fn run(&self, query: &QueryContext) -> Result<QaOutcome> {
        let mut state = QaState::new(query);
        let mut node = QaNode::Retrieve;

        while !node.is_terminal() {
            let timer = start_timing(&mut state.telemetry, node.step_name());
            let update = self.execute_node(node, &state).await?;
            state.telemetry.record_tokens(node.step_name(), update.usage());
            finish_timing(&mut state.telemetry, timer);

            let event = update.event();
            state.apply(update);
            node = node.transition(event)?;
        }

        Ok(state.into())
    }

    async fn execute_node(&self, node: QaNode, state: &QaState) -> Result<QaUpdate> {
        match node {
            QaNode::Retrieve => {
                let passages = self
                    .selector
                    .select(&state.question, state.top_k, state.metadata_filter.as_ref())
                    .await?;
                tracing::info!(retrieved = passages.len(), "agent_retrieve");
                Ok(QaUpdate::Retrieved(passages))
            }
            QaNode::Assess => {
                let ok = self.looks_relevant(&state.question, &state.passages);
                tracing::info!(retrieved = state.passages.len(), ok, "agent_assess");
                Ok(QaUpdate::Assessed { ok })
            }
            QaNode::Rewrite => self.rewrite(&state.question).await,
            QaNode::Retrieve2 => {
                let query = state
                    .rewritten_question
                    .as_deref()
                    .filter(|q| !q.is_empty())
                    .unwrap_or(&state.question);
                let passages = self
                    .selector
                    .select(query, state.top_k, state.metadata_filter.as_ref())
                    .await?;
                tracing::info!(retrieved = passages.len(), "agent_retrieve2");
                Ok(QaUpdate::Retrieved(passages))
            }
            QaNode::Answer => self.answer(&state.question, &state.passages).await,
            QaNode::End => Err(QaError::InvalidTransition {
                from: "End".to_string(),
                event: "execute".to_string(),
            }),
        }
    }

    /// Keyword heuristic for retrieval relevance
    ///
    /// Questions without a domain keyword pass on passage count alone;
    /// otherwise some question keyword must appear in the passage text.
    pub fn looks_relevant(&self, question: &str, passages: &[Passage]) -> bool {
        let question = question.to_lowercase();
        let keywords: Vec<&str> = self
            .config
            .keywords
            .iter()
            .map(String::as_str)
            .filter(|k| question.contains(k))
            .collect();

        if keywords.is_empty() {
            return passages.len() >= self.config.min_passages;
        }

        let joined = passages
            .iter()
            .map(|p| p.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        keywords.iter().any(|k| joined.contains(k))
    }

    async fn rewrite(&self, question: &str) -> Result<QaUpdate> {
        let messages = self.context_builder.rewrite_messages(question);
        let generation = self.generator.invoke(&messages).await?;

        let query = clean_rewrite(&generation.content);
        tracing::info!(
            rewritten = %query.chars().take(LOG_REWRITE_CHARS).collect::<String>(),
            "agent_rewrite"
        );

        Ok(QaUpdate::Rewritten {
            query,
            usage: generation.usage,
        })
    }

    async fn answer(&self, question: &str, passages: &[Passage]) -> Result<QaUpdate> {
        if passages.is_empty() {
            return Ok(QaUpdate::Answered {
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                citations: Vec::new(),
                usage: None,
            });
        }

        let context = self.context_builder.build(passages);
        let messages = self.context_builder.answer_messages(question, &context);
        let generation = self.generator.invoke(&messages).await?;

        Ok(QaUpdate::Answered {
            answer: generation.content,
            citations: passages.iter().map(Citation::from).collect(),
            usage: generation.usage,
        })
    }
}

/// Anything that can answer a question end to end
///
/// The multi-agent worker depends on this rather than on [`QaWorkflow`]
/// so tests can substitute canned outcomes.
#[async_trait]
pub trait QaRunner: Send + Sync {
    async fn run_qa(&self, query: &QueryContext) -> Result<QaOutcome>;
}

#[async_trait]
impl QaRunner for QaWorkflow {
    async fn run_qa(&self, query: &QueryContext) -> Result<QaOutcome> {
        self.run(query).await
    }
}

/// Trim whitespace and surrounding quotes from a rewritten query
fn clean_rewrite(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}
