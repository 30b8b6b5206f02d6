//! Grounding critic
//!
//! Cheap rules first, model call last:
//! 1. Abstaining answers are accepted without a call
//! 2. Answers without citations are sent back without a call
//! 3. Otherwise the model must reply exactly PASS

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backends::GenerationBackend;
use crate::errors::Result;
use crate::types::{ChatMessage, Citation, TokenUsage};

const CRITIC_SYSTEM_PROMPT: &str = "You are a strict grounding critic.\n\
Given an answer and citation list, decide if the answer is grounded.\n\
Return ONLY one token: PASS or FAIL.\n";

pub const CRITIQUE_ABSTAINING: &str = "Answer is safely abstaining.";
pub const CRITIQUE_MISSING_CITATIONS: &str = "Missing citations; retry with rewrite.";
pub const CRITIQUE_GROUNDED: &str = "Grounded answer.";
pub const CRITIQUE_UNGROUNDED: &str = "Potentially ungrounded; retry once.";

/// Critic decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticVerdict {
    /// Answer is done
    Accept,
    /// Another worker pass is wanted
    Retry,
}

/// Critic output
#[derive(Debug, Clone, PartialEq)]
pub struct CriticReview {
    pub verdict: CriticVerdict,
    pub critique: String,
    pub usage: Option<TokenUsage>,
}

impl CriticReview {
    fn without_call(verdict: CriticVerdict, critique: &str) -> Self {
        Self {
            verdict,
            critique: critique.to_string(),
            usage: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.verdict == CriticVerdict::Accept
    }
}

/// Grounding critic agent
pub struct Critic {
    generator: Arc<dyn GenerationBackend>,
}

impl Critic {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Review an answer and its citations
    pub async fn review(&self, answer: &str, citations: &[Citation]) -> Result<CriticReview> {
        let answer = answer.trim();

        if answer.to_lowercase().starts_with("i don't know") {
            return Ok(CriticReview::without_call(CriticVerdict::Accept, CRITIQUE_ABSTAINING));
        }

        if citations.is_empty() {
            return Ok(CriticReview::without_call(CriticVerdict::Retry, CRITIQUE_MISSING_CITATIONS));
        }

        let citation_list = serde_json::to_string(citations)?;
        let messages = vec![
            ChatMessage::system(CRITIC_SYSTEM_PROMPT),
            ChatMessage::user(format!("ANSWER:\n{}\n\nCITATIONS:\n{}", answer, citation_list)),
        ];

        let generation = self.generator.invoke(&messages).await?;
        let verdict_token = generation.content.trim().to_uppercase();
        tracing::debug!(verdict = %verdict_token, "critic verdict token");

        let review = if verdict_token == "PASS" {
            CriticReview {
                verdict: CriticVerdict::Accept,
                critique: CRITIQUE_GROUNDED.to_string(),
                usage: generation.usage,
            }
        } else {
            CriticReview {
                verdict: CriticVerdict::Retry,
                critique: CRITIQUE_UNGROUNDED.to_string(),
                usage: generation.usage,
            }
        };

        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ScriptedGenerator;

    fn citation() -> Citation {
        Citation {
            id: Some("d:0".to_string()),
            source: Some("a.md".to_string()),
            score: 0.8,
        }
    }

    #[tokio::test]
    async fn test_abstaining_answer_accepted_without_call() {
        let generator = Arc::new(ScriptedGenerator::constant("FAIL"));
        let critic = Critic::new(generator.clone());

        let review = critic
            .review("I don't know based on the provided documents.", &[])
            .await
            .unwrap();
        assert!(review.is_done());
        assert_eq!(review.critique, CRITIQUE_ABSTAINING);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_citations_retry_without_call() {
        let generator = Arc::new(ScriptedGenerator::constant("PASS"));
        let critic = Critic::new(generator.clone());

        let review = critic.review("Planners split work.", &[]).await.unwrap();
        assert_eq!(review.verdict, CriticVerdict::Retry);
        assert_eq!(review.critique, CRITIQUE_MISSING_CITATIONS);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_pass_is_exact_after_normalisation() {
        let generator = Arc::new(ScriptedGenerator::with_replies([" pass\n", "PASS.", "FAIL"]));
        let critic = Critic::new(generator.clone());

        assert!(critic.review("answer", &[citation()]).await.unwrap().is_done());
        assert!(!critic.review("answer", &[citation()]).await.unwrap().is_done());

        let review = critic.review("answer", &[citation()]).await.unwrap();
        assert_eq!(review.critique, CRITIQUE_UNGROUNDED);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_prompt_lists_citations() {
        let generator = Arc::new(ScriptedGenerator::constant("PASS"));
        let critic = Critic::new(generator.clone());
        critic.review("Planners split work [d:0].", &[citation()]).await.unwrap();

        let request = &generator.requests()[0];
        assert!(request[1].content.starts_with("ANSWER:\nPlanners split work [d:0]."));
        assert!(request[1].content.contains("CITATIONS:\n[{\"id\":\"d:0\""));
    }
}
