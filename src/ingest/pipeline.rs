// Ingestion pipeline: load → chunk → tag metadata → upsert
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::chunker::{ChunkStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use super::loader::{load_markdown_files, SourceDocument};
use crate::backends::SimilarityBackend;
use crate::errors::Result;
use crate::types::{IndexRecord, PassageMetadata};

/// Ingestion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents ingested per run, in path order
    pub max_docs: usize,
    pub strategy: ChunkStrategy,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_docs: 20,
            strategy: ChunkStrategy::Fixed,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub strategy: String,
}

/// Markdown → index ingestion
pub struct IngestPipeline {
    index: Arc<dyn SimilarityBackend>,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(index: Arc<dyn SimilarityBackend>) -> Self {
        Self::with_config(index, IngestConfig::default())
    }

    pub fn with_config(index: Arc<dyn SimilarityBackend>, config: IngestConfig) -> Self {
        Self { index, config }
    }

    /// Ingest up to `max_docs` markdown files under `root`
    ///
    /// `on_document` is called after each document is upserted, for progress
    /// reporting.
    pub async fn run<F>(&self, root: impl AsRef<Path>, mut on_document: F) -> Result<IngestReport>
    where
        F: FnMut(&SourceDocument, usize),
    {
        let mut documents = load_markdown_files(root)?;
        documents.truncate(self.config.max_docs);
        tracing::info!(
            documents = documents.len(),
            max_docs = self.config.max_docs,
            strategy = %self.config.strategy,
            "ingesting documents"
        );

        let ingested_at = chrono::Utc::now().to_rfc3339();
        let mut report = IngestReport {
            strategy: self.config.strategy.to_string(),
            ..Default::default()
        };

        for doc in &documents {
            let records = self.records_for(doc, &ingested_at);
            let count = records.len();
            tracing::info!(source = %doc.source, chunks = count, strategy = %self.config.strategy, "chunked document");

            if !records.is_empty() {
                self.index.add_passages(records).await?;
            }

            report.documents += 1;
            report.chunks += count;
            on_document(doc, count);
        }

        tracing::info!(chunks = report.chunks, "ingestion complete");
        Ok(report)
    }

    /// Chunk one document into index records
    pub fn records_for(&self, doc: &SourceDocument, ingested_at: &str) -> Vec<IndexRecord> {
        let doc_id = doc_id_for(&doc.source);
        self.config
            .strategy
            .chunk(&doc.text, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let id = format!("{}:{}", doc_id, i);
                IndexRecord {
                    id: id.clone(),
                    text,
                    metadata: PassageMetadata {
                        id: Some(id),
                        doc_id: Some(doc_id.clone()),
                        chunk_id: Some(i as u32),
                        chunk_strategy: Some(self.config.strategy.to_string()),
                        source: Some(doc.source.clone()),
                        ingested_at: Some(ingested_at.to_string()),
                        ..Default::default()
                    },
                }
            })
            .collect()
    }
}

/// Stable 16-hex-digit document id derived from the source path
pub fn doc_id_for(source: &str) -> String {
    blake3::hash(source.as_bytes()).to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryIndex;
    use tempfile::TempDir;

    fn write_docs(dir: &TempDir, count: usize) {
        for i in 0..count {
            std::fs::write(
                dir.path().join(format!("doc{}.md", i)),
                format!("# Doc {}\n\nPlanner agents split work into steps.", i),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_doc_id_is_stable() {
        assert_eq!(doc_id_for("docs/a.md"), doc_id_for("docs/a.md"));
        assert_ne!(doc_id_for("docs/a.md"), doc_id_for("docs/b.md"));
        assert_eq!(doc_id_for("docs/a.md").len(), 16);
    }

    #[tokio::test]
    async fn test_run_respects_max_docs_and_tags_metadata() {
        let dir = TempDir::new().unwrap();
        write_docs(&dir, 3);

        let index = Arc::new(InMemoryIndex::new());
        let pipeline = IngestPipeline::with_config(
            index.clone(),
            IngestConfig {
                max_docs: 2,
                strategy: ChunkStrategy::Semantic,
                ..Default::default()
            },
        );

        let mut seen = Vec::new();
        let report = pipeline
            .run(dir.path(), |doc, _| seen.push(doc.source.clone()))
            .await
            .unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(seen.len(), 2);
        assert_eq!(index.len(), 2);

        let hits = index.similarity_search("planner agents", 5, None).await.unwrap();
        let meta = &hits[0].metadata;
        assert_eq!(meta.chunk_strategy.as_deref(), Some("semantic"));
        assert_eq!(meta.chunk_id, Some(0));
        assert_eq!(meta.id, Some(format!("{}:0", meta.doc_id.clone().unwrap())));
        assert!(meta.ingested_at.as_deref().map_or(false, |t| chrono::DateTime::parse_from_rfc3339(t).is_ok()));
    }

    #[tokio::test]
    async fn test_reingest_upserts_in_place() {
        let dir = TempDir::new().unwrap();
        write_docs(&dir, 1);

        let index = Arc::new(InMemoryIndex::new());
        let pipeline = IngestPipeline::new(index.clone());
        pipeline.run(dir.path(), |_, _| {}).await.unwrap();
        pipeline.run(dir.path(), |_, _| {}).await.unwrap();

        assert_eq!(index.len(), 1);
    }
}
