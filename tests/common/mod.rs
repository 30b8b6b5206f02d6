//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use groundqa::backends::{InMemoryIndex, ScriptedGenerator};
use groundqa::memory::{IndexedLongTermMemory, InMemoryShortTermStore, MemoryService};
use groundqa::types::{ChatMessage, Generation, IndexRecord, PassageMetadata};

/// Index record tagged like the semantic ingestion path tags it
pub fn record(id: &str, source: &str, text: &str) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        text: text.to_string(),
        metadata: PassageMetadata {
            id: Some(id.to_string()),
            source: Some(source.to_string()),
            chunk_strategy: Some("semantic".to_string()),
            ..Default::default()
        },
    }
}

pub fn handbook() -> Arc<InMemoryIndex> {
    Arc::new(InMemoryIndex::with_records(vec![
        record("plan:0", "docs/planner.md", "The planner agent splits a question into retrieval steps."),
        record("plan:1", "docs/planner.md", "Planner steps are capped at four."),
        record("tool:0", "docs/tools.md", "Tools are invoked by the executor agent with validated arguments."),
        record("mem:0", "docs/memory.md", "Short-term memory keeps the last messages of a session."),
    ]))
}

pub fn memory() -> Arc<MemoryService> {
    Arc::new(MemoryService::new(
        Arc::new(InMemoryShortTermStore::new()),
        Arc::new(IndexedLongTermMemory::new(Arc::new(InMemoryIndex::new()))),
    ))
}

/// Which agent a request was addressed to, judged by its system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Planner,
    Critic,
    Rewrite,
    Answer,
}

pub fn role_of(messages: &[ChatMessage]) -> Role {
    let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
    if system.contains("planning agent") {
        Role::Planner
    } else if system.contains("grounding critic") {
        Role::Critic
    } else if system.contains("rewritten query") {
        Role::Rewrite
    } else {
        Role::Answer
    }
}

/// Generator that answers every agent with a fixed reply
pub fn routed(plan: &str, answer: &str, verdict: &str) -> Arc<ScriptedGenerator> {
    let (plan, answer, verdict) = (plan.to_string(), answer.to_string(), verdict.to_string());
    Arc::new(ScriptedGenerator::from_fn(move |messages| {
        Ok(Generation::text(match role_of(messages) {
            Role::Planner => plan.clone(),
            Role::Critic => verdict.clone(),
            Role::Rewrite => "planner agent steps".to_string(),
            Role::Answer => answer.clone(),
        }))
    }))
}

pub fn count_role(generator: &ScriptedGenerator, role: Role) -> usize {
    generator.requests().iter().filter(|r| role_of(r) == role).count()
}
