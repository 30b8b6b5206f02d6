// Context block and prompt assembly for grounded answers
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Passage};

/// Separator between passages in the context block
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

const ANSWER_SYSTEM_PROMPT: &str = "You are a careful assistant. Answer the question using ONLY the provided context.\n\
If the context is insufficient, say you don't know.\n\
When you use facts from the context, cite them using the bracketed chunk ids like [doc:chunk].";

const REWRITE_SYSTEM_PROMPT: &str =
    "Rewrite the user question into a short search query for documentation retrieval. Return ONLY the rewritten query.";

/// Assembled context for an answer prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text
    pub text: String,
    /// Number of passages included
    pub document_count: usize,
    /// Passage ids in context order
    pub document_ids: Vec<String>,
}

/// Builds the citation-friendly context block
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Format passages as `[{id}] source={source}\n{text}` blocks
    pub fn build(&self, passages: &[Passage]) -> AssembledContext {
        let mut parts = Vec::with_capacity(passages.len());
        let mut document_ids = Vec::with_capacity(passages.len());

        for passage in passages {
            let id = passage.metadata.display_id();
            let source = passage.metadata.source.as_deref().unwrap_or("unknown");
            parts.push(format!("[{}] source={}\n{}", id, source, passage.text));
            document_ids.push(id);
        }

        AssembledContext {
            text: parts.join(PASSAGE_SEPARATOR),
            document_count: passages.len(),
            document_ids,
        }
    }

    /// Messages for the grounded answer call
    pub fn answer_messages(&self, question: &str, context: &AssembledContext) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "CONTEXT:\n{}\n\nQUESTION:\n{}\n\nReturn a clear answer with citations.",
                context.text, question
            )),
        ]
    }

    /// Messages for the query rewrite call
    pub fn rewrite_messages(&self, question: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::system(REWRITE_SYSTEM_PROMPT), ChatMessage::user(question)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PassageMetadata, Role};

    fn passage(meta: PassageMetadata, text: &str) -> Passage {
        Passage::new(text, 0.5, meta)
    }

    #[test]
    fn test_build_empty() {
        let context = ContextBuilder::new().build(&[]);
        assert_eq!(context.document_count, 0);
        assert!(context.text.is_empty());
    }

    #[test]
    fn test_build_formats_blocks() {
        let passages = vec![
            passage(
                PassageMetadata {
                    id: Some("d1:0".to_string()),
                    source: Some("docs/a.md".to_string()),
                    ..Default::default()
                },
                "First",
            ),
            passage(
                PassageMetadata {
                    doc_id: Some("d2".to_string()),
                    chunk_id: Some(4),
                    ..Default::default()
                },
                "Second",
            ),
        ];

        let context = ContextBuilder::new().build(&passages);
        assert_eq!(
            context.text,
            "[d1:0] source=docs/a.md\nFirst\n\n---\n\n[d2:4] source=unknown\nSecond"
        );
        assert_eq!(context.document_ids, vec!["d1:0", "d2:4"]);
    }

    #[test]
    fn test_answer_messages() {
        let builder = ContextBuilder::new();
        let context = AssembledContext {
            text: "[a] source=x\nBody".to_string(),
            document_count: 1,
            document_ids: vec!["a".to_string()],
        };
        let messages = builder.answer_messages("What is X?", &context);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("ONLY the provided context"));
        assert!(messages[1].content.starts_with("CONTEXT:\n[a] source=x\nBody"));
        assert!(messages[1].content.contains("QUESTION:\nWhat is X?"));
    }

    #[test]
    fn test_rewrite_messages() {
        let messages = ContextBuilder::new().rewrite_messages("how do agents work");
        assert_eq!(messages[1].content, "how do agents work");
        assert!(messages[0].content.contains("Return ONLY the rewritten query"));
    }
}
