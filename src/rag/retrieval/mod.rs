// Retrieval selection
pub mod engine;

pub use engine::{RetrievalSelector, DEFAULT_OVERFETCH_MULTIPLIER};
