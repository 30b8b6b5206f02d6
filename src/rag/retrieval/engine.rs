// Retrieval selector: over-fetch, then dedupe by source
use std::collections::HashSet;
use std::sync::Arc;

use crate::backends::SimilarityBackend;
use crate::errors::Result;
use crate::types::{MetadataFilter, Passage};

/// Default over-fetch multiplier
pub const DEFAULT_OVERFETCH_MULTIPLIER: usize = 6;

/// Query characters shown in the retrieval log line
const LOG_QUERY_CHARS: usize = 60;

/// Deduplicating top-K selector over a similarity backend
#[derive(Clone)]
pub struct RetrievalSelector {
    backend: Arc<dyn SimilarityBackend>,
    overfetch_multiplier: usize,
}

impl RetrievalSelector {
    /// Create new selector with the default over-fetch multiplier
    pub fn new(backend: Arc<dyn SimilarityBackend>) -> Self {
        Self::with_multiplier(backend, DEFAULT_OVERFETCH_MULTIPLIER)
    }

    /// Create with custom over-fetch multiplier
    pub fn with_multiplier(backend: Arc<dyn SimilarityBackend>, overfetch_multiplier: usize) -> Self {
        Self {
            backend,
            overfetch_multiplier: overfetch_multiplier.max(1),
        }
    }

    /// Up to `top_k` passages, at most one per non-empty source
    ///
    /// Passages are taken in backend order from a single over-fetch; the
    /// first passage seen for a source wins regardless of score. Passages
    /// without a source are never deduplicated.
    pub async fn select(
        &self,
        query: &str,
        top_k: usize,
        metadata_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let fetch_k = top_k.saturating_mul(self.overfetch_multiplier);
        let candidates = self.backend.similarity_search(query, fetch_k, metadata_filter).await?;

        let selected = dedupe_by_source(candidates, top_k);

        tracing::info!(
            backend = self.backend.name(),
            retrieved = selected.len(),
            top_k,
            filter = ?metadata_filter,
            query = %query.chars().take(LOG_QUERY_CHARS).collect::<String>(),
            "retrieved chunks"
        );

        Ok(selected)
    }

    /// Get over-fetch multiplier
    pub fn overfetch_multiplier(&self) -> usize {
        self.overfetch_multiplier
    }
}

/// Keep the first passage per source until `top_k` survive
fn dedupe_by_source(candidates: Vec<Passage>, top_k: usize) -> Vec<Passage> {
    let mut seen_sources: HashSet<String> = HashSet::new();
    let mut selected = Vec::with_capacity(top_k);

    for passage in candidates {
        if let Some(source) = passage.metadata.source_key() {
            if !seen_sources.insert(source.to_string()) {
                continue;
            }
        }
        selected.push(passage);
        if selected.len() >= top_k {
            break;
        }
    }

    selected
}
