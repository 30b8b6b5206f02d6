//! Plan/work/critic workflow over the in-memory backends
//!
//! No model server is needed; the generator routes on system prompts.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{count_role, handbook, memory, routed, Role};
use groundqa::agent::{MultiAgentWorkflow, Termination, INSUFFICIENT_SOURCES_ANSWER, MAX_ATTEMPTS};
use groundqa::backends::{InMemoryIndex, ScriptedGenerator};
use groundqa::rag::{QaWorkflow, RetrievalSelector};
use groundqa::service::{QaRequest, QaService};
use groundqa::telemetry::RAG_SUB_KEY;
use groundqa::types::QueryContext;

const PLAN: &str = r#"{"steps":["Retrieve planner docs","Answer with citations","Verify grounding"]}"#;
const GROUNDED: &str = "The planner agent splits a question into retrieval steps [plan:0].";

fn workflow(index: Arc<InMemoryIndex>, generator: Arc<ScriptedGenerator>) -> MultiAgentWorkflow {
    let qa = Arc::new(QaWorkflow::new(RetrievalSelector::new(index), generator.clone()));
    MultiAgentWorkflow::new(qa, generator, memory())
}

#[tokio::test]
async fn test_grounded_answer_passes_first_cycle() {
    let generator = routed(PLAN, GROUNDED, "PASS");
    let wf = workflow(handbook(), generator.clone());

    let out = wf
        .run(&QueryContext::new("How does the planner agent split questions?"))
        .await
        .unwrap();

    assert_eq!(out.answer, GROUNDED);
    assert_eq!(out.attempts, 1);
    assert!(out.done);
    assert_eq!(out.termination, Termination::Accepted);
    assert_eq!(out.plan.len(), 3);
    assert_eq!(out.critique.as_deref(), Some("Grounded answer."));

    // One passage per source
    let sources: Vec<_> = out.citations.iter().filter_map(|c| c.source.clone()).collect();
    let unique: HashSet<_> = sources.iter().collect();
    assert_eq!(sources.len(), unique.len());
    assert_eq!(out.citations[0].id.as_deref(), Some("plan:0"));

    assert_eq!(count_role(&generator, Role::Planner), 1);
    assert_eq!(count_role(&generator, Role::Critic), 1);
    assert_eq!(count_role(&generator, Role::Rewrite), 0);
}

#[tokio::test]
async fn test_failing_critic_stops_at_attempt_cap() {
    let generator = routed(PLAN, GROUNDED, "FAIL");
    let wf = workflow(handbook(), generator.clone());

    let out = wf
        .run(&QueryContext::new("How does the planner agent split questions?"))
        .await
        .unwrap();

    assert_eq!(out.attempts, MAX_ATTEMPTS);
    assert!(!out.done);
    assert_eq!(out.termination, Termination::Exhausted);
    // Last worker answer is still returned
    assert_eq!(out.answer, GROUNDED);
    assert_eq!(count_role(&generator, Role::Planner), 1);
    assert_eq!(count_role(&generator, Role::Critic), MAX_ATTEMPTS);
    assert_eq!(out.telemetry.steps, vec!["plan", "work", "critic", "work", "critic"]);
}

#[tokio::test]
async fn test_empty_corpus_abstains_without_critic_call() {
    let generator = routed(PLAN, "unused", "PASS");
    let wf = workflow(Arc::new(InMemoryIndex::new()), generator.clone());

    let out = wf
        .run(&QueryContext::new("How does the planner agent split questions?"))
        .await
        .unwrap();

    assert_eq!(out.answer, INSUFFICIENT_SOURCES_ANSWER);
    assert!(out.citations.is_empty());
    assert_eq!(out.attempts, 1);
    assert!(out.done);

    let guardrails = out.telemetry.guardrails.unwrap();
    assert!(guardrails.abstained);
    assert_eq!(guardrails.chunks_used, 0);

    // Nothing retrieved, so the single pass tried one rewrite
    assert_eq!(count_role(&generator, Role::Rewrite), 1);
    assert_eq!(count_role(&generator, Role::Answer), 0);
    assert_eq!(count_role(&generator, Role::Critic), 0);
}

#[tokio::test]
async fn test_ungrounded_answer_with_sources_is_kept_and_flagged() {
    let generator = routed(PLAN, "Bananas ripen quickly in warm kitchens.", "FAIL");
    let wf = workflow(handbook(), generator);

    let out = wf
        .run(&QueryContext::new("How does the planner agent split questions?"))
        .await
        .unwrap();

    let guardrails = out.telemetry.guardrails.unwrap();
    assert!(guardrails.abstained);
    assert!(guardrails.grounding_score < 0.12);
    assert!(guardrails.chunks_used > 0);
    assert_eq!(out.answer, "Bananas ripen quickly in warm kitchens.");
    assert_eq!(out.termination, Termination::Exhausted);
}

#[tokio::test]
async fn test_single_pass_telemetry_is_nested() {
    let generator = routed(PLAN, GROUNDED, "PASS");
    let wf = workflow(handbook(), generator);

    let out = wf
        .run(&QueryContext::new("How does the planner agent split questions?"))
        .await
        .unwrap();

    assert_eq!(out.telemetry.steps, vec!["plan", "work", "critic"]);
    let rag = out.telemetry.sub(RAG_SUB_KEY).unwrap();
    assert_eq!(rag.steps, vec!["retrieve", "assess", "answer"]);
    assert!(out.telemetry.memory.is_some());
}

#[tokio::test]
async fn test_service_feeds_session_memory_into_next_turn() {
    let generator = routed(PLAN, GROUNDED, "PASS");
    let index = handbook();
    let memory = memory();
    let qa = Arc::new(QaWorkflow::new(RetrievalSelector::new(index), generator.clone()));
    let multi = Arc::new(MultiAgentWorkflow::new(qa.clone(), generator.clone(), memory.clone()));
    let service = QaService::new(qa, multi, memory);

    let request = QaRequest {
        session_id: Some("s1".to_string()),
        user_id: Some("u1".to_string()),
        ..QaRequest::new("How does the planner agent split questions?")
    };

    let first = service.ask(&request).await.unwrap();
    assert_eq!(first.stats.memory.unwrap().short_count, 0);
    assert!(first.stats.latency_ms.contains_key("total"));

    let second = service.ask(&request).await.unwrap();
    assert_eq!(second.stats.memory.unwrap().short_count, 2);

    let last_answer_prompt = generator
        .requests()
        .into_iter()
        .filter(|r| common::role_of(r) == Role::Answer)
        .last()
        .unwrap();
    assert!(last_answer_prompt[1].content.contains("MEMORY CONTEXT"));
}
