//! Multi-agent orchestration
//!
//! State machines for both workflows plus the planner, worker and critic
//! agents driven by [`MultiAgentWorkflow`].

pub mod critic;
pub mod orchestrator;
pub mod planner;
pub mod state;
pub mod worker;

// Re-export commonly used types
pub use critic::{Critic, CriticReview, CriticVerdict};
pub use orchestrator::{MultiAgentOutcome, MultiAgentState, MultiAgentWorkflow, MultiUpdate, Termination, MAX_ATTEMPTS};
pub use planner::{default_plan, parse_plan, strip_code_fences, Planner, DEFAULT_PLAN};
pub use state::{MultiEvent, MultiNode, QaEvent, QaNode};
pub use worker::{WorkOutput, Worker, INSUFFICIENT_SOURCES_ANSWER};
