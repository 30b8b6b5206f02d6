//! Long-term memory over a similarity backend

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{LongTermMemory, MemoryHit};
use crate::backends::SimilarityBackend;
use crate::errors::Result;
use crate::types::{IndexRecord, MetadataFilter};

/// Metadata key scoping memories to a user
pub const USER_ID_KEY: &str = "user_id";

/// Long-term memory stored in any [`SimilarityBackend`]
pub struct IndexedLongTermMemory {
    backend: Arc<dyn SimilarityBackend>,
}

impl IndexedLongTermMemory {
    pub fn new(backend: Arc<dyn SimilarityBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl LongTermMemory for IndexedLongTermMemory {
    async fn search(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut filter = MetadataFilter::new();
        filter.insert(USER_ID_KEY.to_string(), Value::String(user_id.to_string()));

        let passages = self.backend.similarity_search(query, top_k, Some(&filter)).await?;
        Ok(passages
            .into_iter()
            .map(|p| MemoryHit {
                text: p.text,
                metadata: p.metadata,
                score: p.score,
            })
            .collect())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.backend.add_passages(records).await
    }
}
