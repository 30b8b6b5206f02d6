//! Retrieval data model: query context, passages and citations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default number of passages requested per query
pub const DEFAULT_TOP_K: usize = 4;

/// Default user identifier when the caller supplies none
pub const DEFAULT_USER_ID: &str = "default-user";

/// Default session identifier when the caller supplies none
pub const DEFAULT_SESSION_ID: &str = "default-session";

/// Opaque key/value equality constraints handed to the similarity backend
pub type MetadataFilter = BTreeMap<String, Value>;

/// Immutable per-invocation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub question: String,
    pub top_k: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_filter: Option<MetadataFilter>,
    pub user_id: String,
    pub session_id: String,
}

impl QueryContext {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: DEFAULT_TOP_K,
            metadata_filter: None,
            user_id: DEFAULT_USER_ID.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Option<MetadataFilter>) -> Self {
        self.metadata_filter = filter;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

/// Metadata attached to every indexed passage
///
/// Well-known fields are typed; anything else a backend stores (for example
/// `user_id` on long-term memories) lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PassageMetadata {
    /// Build metadata from an untyped payload map
    pub fn from_map(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map.clone())).unwrap_or_else(|_| Self {
            extra: map,
            ..Default::default()
        })
    }

    /// Flatten back into an untyped payload map
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Source path used for deduplication; `None` when empty or missing
    pub fn source_key(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Identifier shown to the model in the context block
    pub fn display_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!(
                "{}:{}",
                self.doc_id.as_deref().unwrap_or("unknown"),
                self.chunk_id
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        }
    }

    /// Equality match against every constraint in `filter`
    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        let map = self.to_map();
        filter
            .iter()
            .all(|(key, expected)| map.get(key).map_or(false, |actual| actual == expected))
    }
}

/// One retrievable unit of document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Backend-defined ranking key; never compared across backends
    pub score: f32,
    pub metadata: PassageMetadata,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f32, metadata: PassageMetadata) -> Self {
        Self {
            text: text.into(),
            score,
            metadata,
        }
    }

    /// Length in characters, the unit of the context budget
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Record written to a similarity backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub metadata: PassageMetadata,
}

/// User-facing reference to a passage that backed an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: Option<String>,
    pub source: Option<String>,
    pub score: f32,
}

impl From<&Passage> for Citation {
    fn from(passage: &Passage) -> Self {
        Self {
            id: passage.metadata.id.clone(),
            source: passage.metadata.source.clone(),
            score: passage.score,
        }
    }
}
