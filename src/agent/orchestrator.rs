//! Multi-agent orchestrator
//!
//! Runs the plan → work → critic loop over [`MultiNode`]. Each node returns a
//! [`MultiUpdate`] that is merged into one [`MultiAgentState`]; routing after
//! the critic depends on the verdict and the attempt count.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::critic::{Critic, CriticReview, CriticVerdict};
use super::planner::{PlanOutput, Planner};
use super::state::{MultiEvent, MultiNode};
use super::worker::{WorkOutput, Worker};
use crate::backends::GenerationBackend;
use crate::errors::{QaError, Result};
use crate::guardrails::GuardrailConfig;
use crate::memory::MemoryService;
use crate::rag::{QaPath, QaRunner};
use crate::telemetry::{finish_timing, start_timing, TelemetryRecord, RAG_SUB_KEY};
use crate::types::{Citation, QueryContext};

/// Worker passes per invocation, the initial one included
pub const MAX_ATTEMPTS: usize = 2;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Critic accepted the answer
    Accepted,
    /// Attempt ceiling reached; last answer returned as-is
    Exhausted,
}

/// Canonical multi-agent state
#[derive(Debug, Clone, Default)]
pub struct MultiAgentState {
    pub query: Option<QueryContext>,
    pub plan: Vec<String>,
    pub current_step: usize,
    pub attempts: usize,
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
    pub retrieved: usize,
    pub path: QaPath,
    pub rewritten_question: Option<String>,
    pub critique: Option<String>,
    pub done: bool,
    pub termination: Option<Termination>,
    pub telemetry: TelemetryRecord,
}

/// Partial update returned by one node
#[derive(Debug)]
pub enum MultiUpdate {
    Planned(PlanOutput),
    Worked(Box<WorkOutput>),
    Reviewed(CriticReview),
}

impl MultiAgentState {
    pub fn new(query: &QueryContext) -> Self {
        Self {
            query: Some(query.clone()),
            ..Default::default()
        }
    }

    /// Merge a node's update; new values override
    pub fn apply(&mut self, update: MultiUpdate) {
        match update {
            MultiUpdate::Planned(plan) => {
                self.telemetry.record_tokens(MultiNode::Plan.step_name(), plan.usage);
                self.plan = plan.steps;
                self.current_step = 0;
                self.attempts = 0;
            }
            MultiUpdate::Worked(work) => {
                let work = *work;
                self.attempts += 1;
                self.answer = Some(work.answer);
                self.citations = work.citations;
                self.retrieved = work.retrieved;
                self.path = work.path;
                self.rewritten_question = work.rewritten_question;
                *self.telemetry.memory_mut() = work.memory;
                *self.telemetry.guardrails_mut() = work.guardrails;
                self.telemetry.embed_sub(RAG_SUB_KEY, work.rag_telemetry);
            }
            MultiUpdate::Reviewed(review) => {
                self.telemetry.record_tokens(MultiNode::Critic.step_name(), review.usage);
                self.done = review.is_done();
                self.critique = Some(review.critique);
            }
        }
    }

    /// Event emitted once `node`'s update has been applied
    fn route(&self, node: MultiNode, max_attempts: usize) -> MultiEvent {
        match node {
            MultiNode::Plan => MultiEvent::Planned,
            MultiNode::Critic if self.done => MultiEvent::Accepted,
            MultiNode::Critic if self.attempts >= max_attempts => MultiEvent::Exhausted,
            MultiNode::Critic => MultiEvent::RetryWork,
            MultiNode::Work | MultiNode::End => MultiEvent::WorkDone,
        }
    }

    /// Final outcome; the loop only terminates after a worker pass
    fn into_outcome(self) -> Result<MultiAgentOutcome> {
        let termination = self.termination.ok_or_else(|| {
            QaError::Internal("multi-agent loop ended without a termination status".to_string())
        })?;
        let answer = self
            .answer
            .ok_or_else(|| QaError::Internal("multi-agent loop ended before any worker pass".to_string()))?;

        Ok(MultiAgentOutcome {
            answer,
            citations: self.citations,
            plan: self.plan,
            current_step: self.current_step,
            attempts: self.attempts,
            critique: self.critique,
            done: self.done,
            termination,
            retrieved: self.retrieved,
            path: self.path,
            rewritten_question: self.rewritten_question,
            telemetry: self.telemetry,
        })
    }

    fn advance_step(&mut self, node: MultiNode) {
        self.current_step = node.plan_phase().min(self.plan.len().saturating_sub(1));
    }
}

/// Result of one multi-agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAgentOutcome {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub plan: Vec<String>,
    pub current_step: usize,
    pub attempts: usize,
    pub critique: Option<String>,
    pub done: bool,
    pub termination: Termination,
    pub retrieved: usize,
    pub path: QaPath,
    pub rewritten_question: Option<String>,
    pub telemetry: TelemetryRecord,
}

/// Plan/work/critic workflow
pub struct MultiAgentWorkflow {
    planner: Planner,
    worker: Worker,
    critic: Critic,
    max_attempts: usize,
}

impl MultiAgentWorkflow {
    /// Create new workflow with default guardrails
    pub fn new(qa: Arc<dyn QaRunner>, generator: Arc<dyn GenerationBackend>, memory: Arc<MemoryService>) -> Self {
        Self::with_guardrails(qa, generator, memory, GuardrailConfig::default())
    }

    /// Create with custom guardrail limits
    pub fn with_guardrails(
        qa: Arc<dyn QaRunner>,
        generator: Arc<dyn GenerationBackend>,
        memory: Arc<MemoryService>,
        guardrails: GuardrailConfig,
    ) -> Self {
        Self {
            planner: Planner::new(generator.clone()),
            worker: Worker::new(qa, memory, guardrails),
            critic: Critic::new(generator),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Attempt ceiling in effect
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run the loop to completion
    pub async fn run(&self, query: &QueryContext) -> Result<MultiAgentOutcome> {
        let mut state = MultiAgentState::new(query);
        let mut node = MultiNode::Plan;

        while !node.is_terminal() {
            let timer = start_timing(&mut state.telemetry, node.step_name());
            let update = self.execute_node(node, query, &state).await?;
            state.apply(update);
            finish_timing(&mut state.telemetry, timer);
            state.advance_step(node);

            self.log_node(node, &state);

            let event = state.route(node, self.max_attempts);
            match event {
                MultiEvent::Accepted => state.termination = Some(Termination::Accepted),
                MultiEvent::Exhausted => state.termination = Some(Termination::Exhausted),
                _ => {}
            }
            node = node.transition(event)?;
        }

        state.into_outcome()
    }

    async fn execute_node(&self, node: MultiNode, query: &QueryContext, state: &MultiAgentState) -> Result<MultiUpdate> {
        match node {
            MultiNode::Plan => Ok(MultiUpdate::Planned(self.planner.plan(&query.question).await?)),
            MultiNode::Work => Ok(MultiUpdate::Worked(Box::new(self.worker.work(query).await?))),
            MultiNode::Critic => {
                let answer = state
                    .answer
                    .as_deref()
                    .ok_or_else(|| QaError::Internal("critic reached before any worker pass".to_string()))?;
                Ok(MultiUpdate::Reviewed(self.critic.review(answer, &state.citations).await?))
            }
            MultiNode::End => Err(QaError::InvalidTransition {
                from: "End".to_string(),
                event: "execute".to_string(),
            }),
        }
    }

    fn log_node(&self, node: MultiNode, state: &MultiAgentState) {
        match node {
            MultiNode::Plan => tracing::info!(steps = state.plan.len(), "multi_plan"),
            MultiNode::Work => tracing::info!(attempts = state.attempts, path = state.path.as_str(), "multi_work_done"),
            MultiNode::Critic => {
                let verdict = if state.done { CriticVerdict::Accept } else { CriticVerdict::Retry };
                tracing::info!(verdict = ?verdict, attempts = state.attempts, "multi_critic");
            }
            MultiNode::End => {}
        }
    }
}
