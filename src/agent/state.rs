//! Workflow graphs as finite state machines
//!
//! Both workflows have a fixed topology, encoded here as transition tables:
//! - Determinism: unique next node per (node, event)
//! - Liveness: every path reaches `End`
//! - The only cycle is critic → work, bounded by the attempt ceiling

use crate::errors::{QaError, Result};
use serde::{Deserialize, Serialize};

/// Nodes of the single-pass QA workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaNode {
    /// Retrieve with the original question
    Retrieve,

    /// Cheap relevance check on the retrieved passages
    Assess,

    /// Rewrite the question into a search query
    Rewrite,

    /// Retrieve with the rewritten query
    Retrieve2,

    /// Generate a cited answer (or fall back when nothing was retrieved)
    Answer,

    /// Terminal
    End,
}

/// Events emitted by QA nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaEvent {
    /// Passages retrieved (possibly none)
    Retrieved,

    /// Retrieval judged relevant
    RelevanceOk,

    /// Retrieval judged weak
    RelevanceLow,

    /// Rewritten query produced
    Rewritten,

    /// Answer produced
    Answered,
}

impl QaNode {
    /// Check if this is the terminal node
    pub fn is_terminal(&self) -> bool {
        matches!(self, QaNode::End)
    }

    /// Attempt transition
    ///
    /// # Transition table
    ///
    /// ```text
    /// Retrieve  → Assess     (on: Retrieved)
    /// Assess    → Answer     (on: RelevanceOk)
    /// Assess    → Rewrite    (on: RelevanceLow)
    /// Rewrite   → Retrieve2  (on: Rewritten)
    /// Retrieve2 → Answer     (on: Retrieved)
    /// Answer    → End        (on: Answered)
    /// ```
    pub fn transition(&self, event: QaEvent) -> Result<QaNode> {
        use QaEvent::*;
        use QaNode::*;

        let next = match (self, event) {
            (Retrieve, Retrieved) => Assess,
            (Assess, RelevanceOk) => Answer,
            (Assess, RelevanceLow) => Rewrite,
            (Rewrite, Rewritten) => Retrieve2,
            (Retrieve2, Retrieved) => Answer,
            (Answer, Answered) => End,
            (from, event) => {
                return Err(QaError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Step name used in telemetry and logs
    pub fn step_name(&self) -> &'static str {
        match self {
            QaNode::Retrieve => "retrieve",
            QaNode::Assess => "assess",
            QaNode::Rewrite => "rewrite",
            QaNode::Retrieve2 => "retrieve2",
            QaNode::Answer => "answer",
            QaNode::End => "end",
        }
    }
}

/// Nodes of the multi-agent workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiNode {
    Plan,
    Work,
    Critic,
    End,
}

/// Events emitted by multi-agent nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiEvent {
    /// Plan produced (possibly the default plan)
    Planned,

    /// Worker pass finished
    WorkDone,

    /// Critic accepted the answer
    Accepted,

    /// Critic asked for another pass and attempts remain
    RetryWork,

    /// Critic asked for another pass but the ceiling is reached
    Exhausted,
}

impl MultiNode {
    /// Check if this is the terminal node
    pub fn is_terminal(&self) -> bool {
        matches!(self, MultiNode::End)
    }

    /// Attempt transition
    ///
    /// # Transition table
    ///
    /// ```text
    /// Plan   → Work    (on: Planned)
    /// Work   → Critic  (on: WorkDone)
    /// Critic → End     (on: Accepted | Exhausted)
    /// Critic → Work    (on: RetryWork)
    /// ```
    pub fn transition(&self, event: MultiEvent) -> Result<MultiNode> {
        use MultiEvent::*;
        use MultiNode::*;

        let next = match (self, event) {
            (Plan, Planned) => Work,
            (Work, WorkDone) => Critic,
            (Critic, Accepted) => End,
            (Critic, Exhausted) => End,
            (Critic, RetryWork) => Work,
            (from, event) => {
                return Err(QaError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Get all valid events from this node
    pub fn valid_events(&self) -> Vec<MultiEvent> {
        use MultiEvent::*;

        match self {
            MultiNode::Plan => vec![Planned],
            MultiNode::Work => vec![WorkDone],
            MultiNode::Critic => vec![Accepted, RetryWork, Exhausted],
            MultiNode::End => vec![],
        }
    }

    /// Step name used in telemetry and logs
    pub fn step_name(&self) -> &'static str {
        match self {
            MultiNode::Plan => "plan",
            MultiNode::Work => "work",
            MultiNode::Critic => "critic",
            MultiNode::End => "end",
        }
    }

    /// Plan step index this node corresponds to (plan/retrieve, answer, verify)
    pub fn plan_phase(&self) -> usize {
        match self {
            MultiNode::Plan => 0,
            MultiNode::Work => 1,
            MultiNode::Critic | MultiNode::End => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_direct_path() {
        let mut node = QaNode::Retrieve;
        for event in [QaEvent::Retrieved, QaEvent::RelevanceOk, QaEvent::Answered] {
            node = node.transition(event).unwrap();
        }
        assert!(node.is_terminal());
    }

    #[test]
    fn test_qa_rewrite_path() {
        let mut visited = vec![QaNode::Retrieve];
        let mut node = QaNode::Retrieve;
        for event in [
            QaEvent::Retrieved,
            QaEvent::RelevanceLow,
            QaEvent::Rewritten,
            QaEvent::Retrieved,
            QaEvent::Answered,
        ] {
            node = node.transition(event).unwrap();
            visited.push(node);
        }
        assert_eq!(
            visited,
            vec![
                QaNode::Retrieve,
                QaNode::Assess,
                QaNode::Rewrite,
                QaNode::Retrieve2,
                QaNode::Answer,
                QaNode::End
            ]
        );
    }

    #[test]
    fn test_qa_invalid_transition() {
        let result = QaNode::Retrieve.transition(QaEvent::Answered);
        assert!(matches!(result, Err(QaError::InvalidTransition { .. })));
        assert!(QaNode::End.transition(QaEvent::Retrieved).is_err());
    }

    #[test]
    fn test_multi_retry_cycle() {
        assert_eq!(MultiNode::Plan.transition(MultiEvent::Planned).unwrap(), MultiNode::Work);
        assert_eq!(MultiNode::Work.transition(MultiEvent::WorkDone).unwrap(), MultiNode::Critic);
        assert_eq!(MultiNode::Critic.transition(MultiEvent::RetryWork).unwrap(), MultiNode::Work);
        assert_eq!(MultiNode::Critic.transition(MultiEvent::Accepted).unwrap(), MultiNode::End);
        assert_eq!(MultiNode::Critic.transition(MultiEvent::Exhausted).unwrap(), MultiNode::End);
    }

    #[test]
    fn test_multi_valid_events_match_table() {
        for node in [MultiNode::Plan, MultiNode::Work, MultiNode::Critic] {
            for event in node.valid_events() {
                assert!(node.transition(event).is_ok());
            }
        }
        assert!(MultiNode::End.valid_events().is_empty());
    }

    #[test]
    fn test_plan_phase() {
        assert_eq!(MultiNode::Plan.plan_phase(), 0);
        assert_eq!(MultiNode::Work.plan_phase(), 1);
        assert_eq!(MultiNode::Critic.plan_phase(), 2);
    }
}
