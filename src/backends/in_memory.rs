//! In-process backends
//!
//! [`InMemoryIndex`] ranks passages by lexical overlap with the query and is
//! used for offline runs and tests. [`ScriptedGenerator`] replays canned
//! replies (or a routing closure) and counts every call, so tests can assert
//! that a short-circuit really skipped the model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use super::{GenerationBackend, SimilarityBackend};
use crate::errors::{QaError, Result};
use crate::guardrails::grounding::content_tokens;
use crate::types::{ChatMessage, Generation, IndexRecord, MetadataFilter, Passage};

/// Lexical similarity index held in memory
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from records in insertion order
    pub fn with_records(records: Vec<IndexRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(query_tokens: &std::collections::HashSet<String>, text: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc_tokens = content_tokens(text);
        let overlap = query_tokens.intersection(&doc_tokens).count();
        overlap as f32 / query_tokens.len() as f32
    }
}

#[async_trait]
impl SimilarityBackend for InMemoryIndex {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        let records = self
            .records
            .read()
            .map_err(|e| QaError::RetrievalBackend(format!("index lock poisoned: {}", e)))?;

        let query_tokens = content_tokens(query);
        let mut hits: Vec<Passage> = records
            .iter()
            .filter(|r| filter.map_or(true, |f| r.metadata.matches(f)))
            .map(|r| Passage::new(r.text.clone(), Self::score(&query_tokens, &r.text), r.metadata.clone()))
            .filter(|p| p.score > 0.0)
            .collect();

        // Stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn add_passages(&self, new_records: Vec<IndexRecord>) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| QaError::RetrievalBackend(format!("index lock poisoned: {}", e)))?;

        for record in new_records {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        Ok(())
    }
}

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<Generation> + Send + Sync>;

enum Script {
    Queue {
        replies: Mutex<VecDeque<Generation>>,
        fallback: Option<Generation>,
    },
    Responder(Responder),
}

/// Generation backend with canned behaviour and call accounting
pub struct ScriptedGenerator {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    /// Replay `replies` in order; fail once they run out
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_generations(replies.into_iter().map(Generation::text))
    }

    /// Replay full generations (with usage) in order
    pub fn with_generations<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Generation>,
    {
        Self {
            script: Script::Queue {
                replies: Mutex::new(replies.into_iter().collect()),
                fallback: None,
            },
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply to every call with the same text
    pub fn constant(reply: impl Into<String>) -> Self {
        Self::with_replies(Vec::<String>::new()).or_else(reply)
    }

    /// Compute each reply from the request
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<Generation> + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(responder)),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply used once the queue is exhausted
    pub fn or_else(mut self, reply: impl Into<String>) -> Self {
        if let Script::Queue { fallback, .. } = &mut self.script {
            *fallback = Some(Generation::text(reply));
        }
        self
    }

    /// Number of `invoke` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        match &self.script {
            Script::Responder(responder) => responder(messages),
            Script::Queue { replies, fallback } => {
                let next = replies
                    .lock()
                    .map_err(|e| QaError::Generation(format!("script lock poisoned: {}", e)))?
                    .pop_front();
                next.or_else(|| fallback.clone())
                    .ok_or_else(|| QaError::Generation("scripted replies exhausted".to_string()))
            }
        }
    }
}
