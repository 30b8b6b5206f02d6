//! groundqa - Grounded Question Answering
//!
//! Answers questions over an ingested document corpus with citations,
//! refusing when the retrieved evidence does not support an answer.
//!
//! # Architecture
//!
//! - **Retrieval**: over-fetching selector with source deduplication
//! - **Single pass**: retrieve, assess, rewrite once, answer
//! - **Multi agent**: planner, guardrailed worker and critic with bounded retries
//! - **Memory**: session transcripts plus per-user long-term recall
//! - **Offline**: markdown ingestion and an evaluation harness

pub mod errors;
pub mod types;

// Backends and shared plumbing
pub mod backends;
pub mod config;
pub mod logging;
pub mod retry;
pub mod telemetry;

// Answering
pub mod agent;
pub mod guardrails;
pub mod memory;
pub mod rag;
pub mod service;

// Offline tooling
pub mod eval;
pub mod ingest;

// Application surface
pub mod bootstrap;
pub mod cli;

// Re-export commonly used types
pub use errors::{QaError, Result};
