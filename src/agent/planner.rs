//! Planner agent
//!
//! Asks the model for a short JSON plan. Planning never fails the workflow
//! on bad output: anything that does not validate becomes the default plan.
//! Backend errors still propagate.

use serde::Deserialize;
use std::sync::Arc;

use crate::backends::GenerationBackend;
use crate::errors::Result;
use crate::types::{ChatMessage, TokenUsage};

/// Plan used whenever model output fails validation
pub const DEFAULT_PLAN: [&str; 3] = ["Retrieve relevant docs", "Answer with citations", "Verify grounding"];

/// Accepted plan length before normalisation
const MIN_STEPS: usize = 2;
const MAX_STEPS: usize = 4;

/// Wire shape of a plan
#[derive(Debug, Deserialize)]
struct PlanModel {
    steps: Vec<String>,
}

/// Output of one planning call
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutput {
    pub steps: Vec<String>,
    pub usage: Option<TokenUsage>,
    /// True when model output was rejected
    pub fell_back: bool,
}

/// Planning agent
pub struct Planner {
    generator: Arc<dyn GenerationBackend>,
}

impl Planner {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// One generation call for a 2–4 step plan
    pub async fn plan(&self, question: &str) -> Result<PlanOutput> {
        let messages = vec![ChatMessage::system(system_prompt()), ChatMessage::user(question)];
        let generation = self.generator.invoke(&messages).await?;

        let (steps, fell_back) = match parse_plan(&generation.content) {
            Some(steps) => (steps, false),
            None => {
                tracing::debug!(raw = %generation.content, "planner output rejected, using default plan");
                (default_plan(), true)
            }
        };

        Ok(PlanOutput {
            steps,
            usage: generation.usage,
            fell_back,
        })
    }
}

/// The fallback plan as owned strings
pub fn default_plan() -> Vec<String> {
    DEFAULT_PLAN.iter().map(|s| s.to_string()).collect()
}

fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "steps": {
                "items": {"type": "string"},
                "maxItems": MAX_STEPS,
                "minItems": MIN_STEPS,
                "title": "Steps",
                "type": "array"
            }
        },
        "required": ["steps"],
        "title": "PlanModel",
        "type": "object"
    })
}

fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&plan_schema()).unwrap_or_default();
    format!(
        "You are a planning agent for a documentation QA assistant.\n\
         Create a minimal plan of 2 to 4 steps.\n\
         Rules:\n\
         - Each step max 8 words.\n\
         - Prefer: retrieve docs → answer → verify.\n\
         - Return ONLY valid JSON (no extra text) that matches this schema:\n\
         {}\n\
         \nExample output:\n\
         {{\"steps\":[\"Retrieve relevant docs\",\"Answer with citations\",\"Verify grounding\"]}}",
        schema
    )
}

/// Remove one surrounding code fence (```` ``` ```` or ```` ```json ````)
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() >= 2 {
        lines.remove(0);
    }
    if lines.last().map_or(false, |l| l.trim().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Validate and normalise model output; `None` means use the default plan
pub fn parse_plan(text: &str) -> Option<Vec<String>> {
    let raw = strip_code_fences(text);
    let model: PlanModel = serde_json::from_str(&raw).ok()?;

    if model.steps.len() < MIN_STEPS || model.steps.len() > MAX_STEPS {
        return None;
    }

    let steps: Vec<String> = model
        .steps
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if steps.len() < MIN_STEPS {
        return None;
    }

    Some(steps.into_iter().take(MAX_STEPS).collect())
}
