// Retrieval-augmented answering
//
// Components:
// - Retrieval Selector: over-fetch + dedupe by source
// - Context Builder: citation-friendly context block and prompts
// - Pipeline: the single-pass retrieve/assess/rewrite/answer workflow

pub mod context;
pub mod pipeline;
pub mod retrieval;

// Re-export key types
pub use context::{AssembledContext, ContextBuilder};
pub use pipeline::{QaConfig, QaOutcome, QaPath, QaRunner, QaState, QaUpdate, QaWorkflow, NO_DOCUMENTS_ANSWER};
pub use retrieval::RetrievalSelector;
