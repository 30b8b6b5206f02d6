// Offline ingestion of markdown documents
//
// Components:
// - Loader: recursive *.md discovery with lossy UTF-8 decoding
// - Chunker: fixed windows or recursive separator splitting
// - Pipeline: metadata tagging and upsert into a similarity backend

pub mod chunker;
pub mod loader;
pub mod pipeline;

pub use chunker::{fixed_chunk, semantic_chunk, ChunkStrategy};
pub use loader::{load_markdown_files, SourceDocument};
pub use pipeline::{doc_id_for, IngestConfig, IngestPipeline, IngestReport};
