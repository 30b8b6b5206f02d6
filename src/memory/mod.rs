//! Conversation memory
//!
//! Two stores feed the worker:
//! - Short-term: the most recent messages of a session, chronological
//! - Long-term: prior turns of a user, retrieved by similarity
//!
//! [`MemoryService`] loads both and persists each answered turn.

pub mod long_term;
pub mod service;
pub mod short_term;

pub use long_term::IndexedLongTermMemory;
pub use service::{MemoryConfig, MemoryService};
pub use short_term::{FileShortTermStore, InMemoryShortTermStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{IndexRecord, PassageMetadata, Role};

/// One stored chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: Role,
    pub content: String,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl MemoryMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One long-term memory retrieved for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHit {
    pub text: String,
    pub metadata: PassageMetadata,
    pub score: f32,
}

/// Session-scoped message log
#[async_trait]
pub trait ShortTermMemory: Send + Sync {
    /// Append one message to a session
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()>;

    /// Up to `limit` most recent messages, oldest first
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryMessage>>;
}

/// User-scoped similarity memory
#[async_trait]
pub trait LongTermMemory: Send + Sync {
    /// Up to `top_k` memories of `user_id` similar to `query`
    async fn search(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryHit>>;

    /// Insert or replace memories by id
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()>;
}
