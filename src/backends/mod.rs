//! Backend seams for retrieval and generation
//!
//! The pipeline core talks to the outside world only through these traits.
//! Implementations handle transport, shape normalisation and (optionally)
//! transient retries; agents and workflows stay vendor-agnostic.
//!
//! - [`ollama`]: Ollama chat + embedding client
//! - [`qdrant`]: Qdrant similarity index over an [`Embedder`]
//! - [`in_memory`]: deterministic lexical index and scripted generator
//! - [`retrying`]: transient-retry wrappers for any backend

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{ChatMessage, Generation, IndexRecord, MetadataFilter, Passage};

pub mod in_memory;
pub mod ollama;
pub mod qdrant;
pub mod retrying;

pub use in_memory::{InMemoryIndex, ScriptedGenerator};
pub use ollama::OllamaClient;
pub use qdrant::QdrantIndex;
pub use retrying::{RetryingGenerator, RetryingIndex};

/// Vector-similarity store
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Up to `k` passages ranked by similarity to `query`.
    ///
    /// Backends that cannot filter must degrade to unfiltered search rather
    /// than fail.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>>;

    /// Insert or replace records by id
    async fn add_passages(&self, records: Vec<IndexRecord>) -> Result<()>;
}

/// Language-model call
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Run one chat completion
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Generation>;
}

/// Text embedding model used by vector indexes
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each text, preserving order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
