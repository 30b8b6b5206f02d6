//! Memory service: load and persist conversation memory

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::long_term::USER_ID_KEY;
use super::{LongTermMemory, MemoryHit, MemoryMessage, ShortTermMemory};
use crate::errors::Result;
use crate::types::{IndexRecord, PassageMetadata, Role};

/// Memory limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Recent session messages loaded per worker pass
    pub max_messages: usize,
    /// Long-term memories loaded per worker pass
    pub long_term_top_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 6,
            long_term_top_k: 3,
        }
    }
}

/// Short- and long-term memory behind one handle
pub struct MemoryService {
    short_term: Arc<dyn ShortTermMemory>,
    long_term: Arc<dyn LongTermMemory>,
    config: MemoryConfig,
}

impl MemoryService {
    /// Create new service with default limits
    pub fn new(short_term: Arc<dyn ShortTermMemory>, long_term: Arc<dyn LongTermMemory>) -> Self {
        Self::with_config(short_term, long_term, MemoryConfig::default())
    }

    /// Create with custom limits
    pub fn with_config(
        short_term: Arc<dyn ShortTermMemory>,
        long_term: Arc<dyn LongTermMemory>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            short_term,
            long_term,
            config,
        }
    }

    /// Recent messages of a session, oldest first
    pub async fn load_short_term(&self, session_id: &str) -> Result<Vec<MemoryMessage>> {
        self.short_term.recent(session_id, self.config.max_messages).await
    }

    /// Prior turns of a user similar to `question`
    pub async fn load_long_term(&self, user_id: &str, question: &str) -> Result<Vec<MemoryHit>> {
        self.long_term
            .search(user_id, question, self.config.long_term_top_k)
            .await
    }

    /// Persist one answered turn to both stores
    pub async fn remember_turn(&self, user_id: &str, session_id: &str, question: &str, answer: &str) -> Result<()> {
        self.short_term.append(session_id, Role::User, question).await?;
        self.short_term.append(session_id, Role::Assistant, answer).await?;

        let records = [(Role::User, question), (Role::Assistant, answer)]
            .into_iter()
            .map(|(role, text)| IndexRecord {
                id: memory_id(user_id, role, text),
                text: text.to_string(),
                metadata: turn_metadata(user_id, session_id, role),
            })
            .collect();

        self.long_term.upsert(records).await?;
        tracing::debug!(user_id, session_id, "remembered turn");
        Ok(())
    }

    /// Get memory limits
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}

/// Stable memory id `{user}:{role}:{hash16}`
pub fn memory_id(user_id: &str, role: Role, content: &str) -> String {
    let digest = blake3::hash(format!("{}:{}:{}", user_id, role, content).as_bytes());
    format!("{}:{}:{}", user_id, role, &digest.to_hex()[..16])
}

fn turn_metadata(user_id: &str, session_id: &str, role: Role) -> PassageMetadata {
    let mut extra = Map::new();
    extra.insert(USER_ID_KEY.to_string(), Value::String(user_id.to_string()));
    extra.insert("session_id".to_string(), Value::String(session_id.to_string()));
    extra.insert("role".to_string(), Value::String(role.to_string()));
    extra.insert("type".to_string(), Value::String("chat".to_string()));

    PassageMetadata {
        extra,
        ..Default::default()
    }
}
