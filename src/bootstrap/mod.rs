//! Bootstrap for groundqa
//!
//! Wires backends, memory and both workflows from [`Settings`], and checks
//! that the model server is reachable before a run.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::MultiAgentWorkflow;
use crate::backends::{
    Embedder, GenerationBackend, InMemoryIndex, OllamaClient, QdrantIndex, RetryingGenerator, RetryingIndex,
    SimilarityBackend,
};
use crate::config::{IndexBackend, Settings};
use crate::errors::Result;
use crate::eval::EvalRunner;
use crate::ingest::{IngestConfig, IngestPipeline};
use crate::memory::{FileShortTermStore, IndexedLongTermMemory, MemoryService};
use crate::rag::{QaConfig, QaWorkflow, RetrievalSelector};
use crate::retry::RetryManager;
use crate::service::QaService;

/// Backend readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
    Ready,
    OllamaNotRunning,
}

/// Qdrant index retried as a whole; the embed call inside is not retried again
fn qdrant_index(
    url: &str,
    collection: &str,
    embedder: Arc<dyn Embedder>,
    retry: RetryManager,
) -> Result<Arc<dyn SimilarityBackend>> {
    let index = QdrantIndex::new(url, collection, embedder)?;
    Ok(Arc::new(RetryingIndex::new(Arc::new(index), retry)))
}

/// Fully wired application components
pub struct Components {
    pub index: Arc<dyn SimilarityBackend>,
    pub generator: Arc<dyn GenerationBackend>,
    pub memory: Arc<MemoryService>,
    pub qa: Arc<QaWorkflow>,
    pub multi: Arc<MultiAgentWorkflow>,
    ollama: Option<OllamaClient>,
}

impl Components {
    /// Build against Ollama and the configured index
    pub fn build(settings: &Settings) -> Result<Self> {
        let retry = RetryManager::with_config(settings.retry.clone());
        let ollama = OllamaClient::with_timeout(
            &settings.llm.base_url,
            &settings.llm.model,
            &settings.llm.embed_model,
            Duration::from_secs(settings.llm.timeout_secs),
        )?;

        let generator: Arc<dyn GenerationBackend> =
            Arc::new(RetryingGenerator::new(Arc::new(ollama.clone()), retry.clone()));
        let embedder: Arc<dyn Embedder> = Arc::new(ollama.clone());

        let (index, memory_index): (Arc<dyn SimilarityBackend>, Arc<dyn SimilarityBackend>) =
            match settings.retrieval.backend {
                IndexBackend::Qdrant => (
                    qdrant_index(
                        &settings.retrieval.qdrant_url,
                        &settings.retrieval.collection,
                        embedder.clone(),
                        retry.clone(),
                    )?,
                    qdrant_index(&settings.retrieval.qdrant_url, &settings.memory.collection, embedder, retry)?,
                ),
                IndexBackend::Memory => (Arc::new(InMemoryIndex::new()), Arc::new(InMemoryIndex::new())),
            };

        let short_term = FileShortTermStore::new(settings.memory.resolved_dir()?)?;
        let memory = Arc::new(MemoryService::with_config(
            Arc::new(short_term),
            Arc::new(IndexedLongTermMemory::new(memory_index)),
            settings.memory.limits(),
        ));

        let mut components = Self::from_parts(settings, index, generator, memory);
        components.ollama = Some(ollama);
        Ok(components)
    }

    /// Build workflows over already-constructed backends
    pub fn from_parts(
        settings: &Settings,
        index: Arc<dyn SimilarityBackend>,
        generator: Arc<dyn GenerationBackend>,
        memory: Arc<MemoryService>,
    ) -> Self {
        let selector = RetrievalSelector::with_multiplier(index.clone(), settings.retrieval.overfetch_multiplier);
        let qa = Arc::new(QaWorkflow::with_config(
            selector,
            generator.clone(),
            QaConfig {
                keywords: settings.retrieval.keywords.clone(),
                min_passages: settings.retrieval.min_passages,
            },
        ));
        let multi = Arc::new(MultiAgentWorkflow::with_guardrails(
            qa.clone(),
            generator.clone(),
            memory.clone(),
            settings.guardrails.clone(),
        ));

        Self {
            index,
            generator,
            memory,
            qa,
            multi,
            ollama: None,
        }
    }

    /// Request/response service over both workflows
    pub fn service(&self) -> QaService {
        QaService::new(self.qa.clone(), self.multi.clone(), self.memory.clone())
    }

    pub fn ingest_pipeline(&self, config: IngestConfig) -> IngestPipeline {
        IngestPipeline::with_config(self.index.clone(), config)
    }

    pub fn eval_runner(&self) -> EvalRunner {
        EvalRunner::new(self.multi.clone())
    }

    /// Check the model server; always ready without one
    pub async fn check(&self) -> BootstrapStatus {
        match &self.ollama {
            Some(client) => match client.health_check().await {
                Ok(true) => BootstrapStatus::Ready,
                _ => BootstrapStatus::OllamaNotRunning,
            },
            None => BootstrapStatus::Ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ScriptedGenerator;
    use crate::errors::QaError;
    use crate::memory::InMemoryShortTermStore;
    use crate::retry::RetryConfig;
    use crate::service::QaRequest;
    use crate::types::{IndexRecord, PassageMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RateLimitedEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for RateLimitedEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(QaError::RateLimited("429".to_string()))
        }
    }

    #[tokio::test]
    async fn test_qdrant_search_retries_embedding_once_per_attempt() {
        let embedder = Arc::new(RateLimitedEmbedder {
            calls: AtomicUsize::new(0),
        });
        let retry = RetryManager::with_config(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        });

        let index = qdrant_index("http://127.0.0.1:6334", "docs", embedder.clone(), retry).unwrap();
        let err = index.similarity_search("planner", 4, None).await.unwrap_err();

        assert!(matches!(err, QaError::RateLimited(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_from_parts_serves_single_pass() {
        let index = Arc::new(InMemoryIndex::with_records(vec![IndexRecord {
            id: "d:0".to_string(),
            text: "planner agents split work".to_string(),
            metadata: PassageMetadata {
                id: Some("d:0".to_string()),
                source: Some("a.md".to_string()),
                chunk_strategy: Some("semantic".to_string()),
                ..Default::default()
            },
        }]));
        let memory = Arc::new(MemoryService::new(
            Arc::new(InMemoryShortTermStore::new()),
            Arc::new(IndexedLongTermMemory::new(Arc::new(InMemoryIndex::new()))),
        ));
        let generator = Arc::new(ScriptedGenerator::constant("Planner agents split work [d:0]."));

        let components = Components::from_parts(&Settings::default(), index, generator, memory);
        assert_eq!(components.check().await, BootstrapStatus::Ready);

        let response = components
            .service()
            .ask_single(&QaRequest::new("how do planner agents work"))
            .await
            .unwrap();
        assert_eq!(response.retrieved, 1);
        assert_eq!(response.citations[0].id.as_deref(), Some("d:0"));
    }
}
