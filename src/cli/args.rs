//! Command-line argument parsing for groundqa
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::guardrails::clamp_top_k_str;
use crate::ingest::ChunkStrategy;
use crate::service::{QaRequest, MAX_REQUEST_TOP_K};
use crate::types::MetadataFilter;

/// groundqa - Grounded, cited answers over your documentation
#[derive(Parser, Debug)]
#[command(name = "groundqa")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Answer questions over a document corpus with citations and guardrails", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.groundqa/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except final result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the question-answering subcommands
#[derive(clap::Args, Debug, Clone)]
pub struct QuestionArgs {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Passages to retrieve (clamped to 1..=10; non-numeric means 10)
    #[arg(short = 'k', long)]
    pub top_k: Option<String>,

    /// Metadata equality filter, repeatable (default: chunk_strategy=semantic)
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask with the plan/work/critic workflow and conversation memory
    Ask {
        #[command(flatten)]
        question: QuestionArgs,

        /// User id for long-term memory
        #[arg(long)]
        user: Option<String>,

        /// Session id for short-term memory
        #[arg(long)]
        session: Option<String>,
    },

    /// Ask with the single-pass retrieve/assess/rewrite/answer workflow
    Qa {
        #[command(flatten)]
        question: QuestionArgs,
    },

    /// Ingest markdown files into the index
    Ingest {
        /// Root directory (searched recursively for *.md)
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Maximum documents to ingest
        #[arg(long, default_value_t = 20)]
        max_docs: usize,

        /// Chunking strategy
        #[arg(long, value_enum, default_value_t = ChunkStrategy::Fixed)]
        strategy: ChunkStrategy,

        /// Chunk size in characters
        #[arg(long, default_value_t = 1200)]
        chunk_size: usize,

        /// Chunk overlap in characters
        #[arg(long, default_value_t = 200)]
        chunk_overlap: usize,
    },

    /// Run the evaluation harness
    Eval {
        /// JSONL case file
        #[arg(long, default_value = "data/eval/cases.jsonl")]
        cases: PathBuf,

        /// Where to write the JSON report
        #[arg(long, default_value = "data/eval/report.json")]
        report: PathBuf,
    },

    /// Display current configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl QuestionArgs {
    /// Build a service request from the parsed flags
    pub fn to_request(&self, user_id: Option<String>, session_id: Option<String>) -> QaRequest {
        let metadata_filter = if self.filters.is_empty() {
            None
        } else {
            Some(
                self.filters
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect::<MetadataFilter>(),
            )
        };

        QaRequest {
            question: self.question.clone(),
            top_k: self.top_k.as_deref().map(|k| clamp_top_k_str(k, MAX_REQUEST_TOP_K)),
            user_id,
            session_id,
            metadata_filter,
        }
    }
}

/// Parse `key=value`
fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show per-step telemetry
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Verbosity::Quiet)
    }

    /// Log filter directive: flags win over the configured level
    pub fn log_directive(&self, configured: &str) -> String {
        match self {
            Verbosity::Quiet => "error".to_string(),
            Verbosity::Normal => configured.to_string(),
            Verbosity::Verbose => "info".to_string(),
            Verbosity::VeryVerbose => "debug".to_string(),
        }
    }
}
