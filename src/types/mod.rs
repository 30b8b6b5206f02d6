//! Type definitions module
//!
//! Core types for backend communication and the retrieval data model.

pub mod messages;
pub mod passage;

// Re-export commonly used types
pub use messages::{ChatMessage, Generation, Role, TokenUsage};
pub use passage::{
    Citation, IndexRecord, MetadataFilter, Passage, PassageMetadata, QueryContext,
    DEFAULT_SESSION_ID, DEFAULT_TOP_K, DEFAULT_USER_ID,
};
