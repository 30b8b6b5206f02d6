//! Evaluation case and result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{QaError, Result};
use crate::telemetry::TelemetryRecord;

pub const DEFAULT_EVAL_USER_ID: &str = "u_eval";
pub const DEFAULT_EVAL_SESSION_ID: &str = "s_eval";

/// One evaluation case from a JSONL file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub question: String,
    pub expect_abstain: bool,
    pub expect_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EvalCase {
    /// Build a case from one parsed JSON line
    ///
    /// `id` and `question` are required; numeric ids are accepted and
    /// stringified.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| QaError::InvalidRequest("eval case must be a JSON object".to_string()))?;

        let required = |key: &str| -> Result<String> {
            obj.get(key)
                .map(value_to_string)
                .ok_or_else(|| QaError::InvalidRequest(format!("eval case missing '{}'", key)))
        };
        let optional = |key: &str, default: &str| obj.get(key).map(value_to_string).unwrap_or_else(|| default.to_string());

        Ok(Self {
            id: required("id")?,
            user_id: optional("user_id", DEFAULT_EVAL_USER_ID),
            session_id: optional("session_id", DEFAULT_EVAL_SESSION_ID),
            question: required("question")?,
            expect_abstain: obj.get("expect_abstain").and_then(Value::as_bool).unwrap_or(false),
            expect_contains: obj
                .get("expect_contains")
                .and_then(Value::as_array)
                .map(|terms| terms.iter().map(value_to_string).collect())
                .unwrap_or_default(),
            notes: obj.get("notes").and_then(Value::as_str).map(str::to_string),
        })
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Outcome of one evaluated case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub case_id: String,
    pub passed: bool,
    pub abstained: bool,
    pub answer: String,
    pub retrieved: usize,
    pub grounding_score: Option<f64>,
    pub fail_reasons: Vec<String>,
    pub stats: TelemetryRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_defaults() {
        let case = EvalCase::from_value(&json!({"id": 7, "question": "What is a planner?"})).unwrap();
        assert_eq!(case.id, "7");
        assert_eq!(case.user_id, DEFAULT_EVAL_USER_ID);
        assert_eq!(case.session_id, DEFAULT_EVAL_SESSION_ID);
        assert!(!case.expect_abstain);
        assert!(case.expect_contains.is_empty());
        assert!(case.notes.is_none());
    }

    #[test]
    fn test_case_requires_question() {
        assert!(EvalCase::from_value(&json!({"id": "a"})).is_err());
        assert!(EvalCase::from_value(&json!(["not", "an", "object"])).is_err());
    }
}
