//! Qdrant similarity index
//!
//! Passages are embedded with an [`Embedder`] and stored as points whose
//! payload carries the passage text under `document` plus every metadata
//! field flattened at the top level, so equality filters map directly onto
//! Qdrant field conditions.

#![allow(deprecated)]

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, r#match::MatchValue, vectors_config::Config,
        with_payload_selector::SelectorOptions, Condition, CreateCollection, Distance,
        FieldCondition, Filter, Match, PointStruct, SearchPoints, Value as QdrantValue,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{Embedder, SimilarityBackend};
use crate::errors::{QaError, Result};
use crate::types::{IndexRecord, MetadataFilter, Passage, PassageMetadata};

/// Payload key holding the passage text
const DOCUMENT_KEY: &str = "document";

/// Similarity backend over a Qdrant collection
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    embedder: Arc<dyn Embedder>,
    collection_ready: OnceCell<()>,
}

impl QdrantIndex {
    /// Connect to Qdrant at `url` using `collection`
    pub fn new(url: &str, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| QaError::RetrievalBackend(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            embedder,
            collection_ready: OnceCell::new(),
        })
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection with cosine distance if it does not exist
    async fn ensure_collection(&self, dimension: u64) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                let collections = self
                    .client
                    .list_collections()
                    .await
                    .map_err(|e| QaError::RetrievalBackend(format!("Failed to list collections: {}", e)))?;

                let exists = collections.collections.iter().any(|c| c.name == self.collection);
                if !exists {
                    self.client
                        .create_collection(&CreateCollection {
                            collection_name: self.collection.clone(),
                            vectors_config: Some(VectorsConfig {
                                config: Some(Config::Params(VectorParams {
                                    size: dimension,
                                    distance: Distance::Cosine.into(),
                                    ..Default::default()
                                })),
                            }),
                            ..Default::default()
                        })
                        .await
                        .map_err(|e| {
                            QaError::RetrievalBackend(format!(
                                "Failed to create collection {}: {}",
                                self.collection, e
                            ))
                        })?;
                    tracing::info!(collection = %self.collection, dimension, "created qdrant collection");
                }
                Ok::<(), QaError>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SimilarityBackend for QdrantIndex {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| QaError::RetrievalBackend("embedder returned no vector".to_string()))?;

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector,
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                filter: filter.and_then(build_filter),
                ..Default::default()
            })
            .await
            .map_err(|e| QaError::RetrievalBackend(format!("Failed to search points: {}", e)))?;

        let passages = search_result
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = Map::new();
                let mut document = String::new();
                for (key, value) in point.payload {
                    if key == DOCUMENT_KEY {
                        document = qdrant_value_to_string(&value).unwrap_or_default();
                    } else if let Some(json_val) = qdrant_to_json_value(&value) {
                        metadata.insert(key, json_val);
                    }
                }
                Passage::new(document, point.score, PassageMetadata::from_map(metadata))
            })
            .collect();

        Ok(passages)
    }

    async fn add_passages(&self, records: Vec<IndexRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        let dimension = embeddings.first().map(|v| v.len() as u64).unwrap_or(0);
        self.ensure_collection(dimension).await?;

        let points: Vec<PointStruct> = records
            .into_iter()
            .zip(embeddings)
            .map(|(record, embedding)| {
                let mut payload_map: HashMap<String, QdrantValue> = HashMap::new();
                for (key, value) in record.metadata.to_map() {
                    payload_map.insert(key, json_to_qdrant_value(value));
                }
                payload_map.insert("id".to_string(), QdrantValue::from(record.id.clone()));
                payload_map.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(record.text));
                PointStruct::new(point_id(&record.id), embedding, payload_map)
            })
            .collect();

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .map_err(|e| QaError::RetrievalBackend(format!("Failed to upsert points: {}", e)))?;

        Ok(())
    }
}

/// Qdrant accepts only UUID or integer ids; derive a stable UUID
fn point_id(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

/// Equality filter as a conjunction of field conditions
fn build_filter(filter: &MetadataFilter) -> Option<Filter> {
    let must: Vec<Condition> = filter
        .iter()
        .filter_map(|(key, value)| {
            let match_value = match value {
                JsonValue::String(s) => MatchValue::Keyword(s.clone()),
                JsonValue::Bool(b) => MatchValue::Boolean(*b),
                JsonValue::Number(n) => MatchValue::Integer(n.as_i64()?),
                _ => return None,
            };
            Some(Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: key.clone(),
                    r#match: Some(Match {
                        match_value: Some(match_value),
                    }),
                    ..Default::default()
                })),
            })
        })
        .collect();

    if must.is_empty() {
        return None;
    }

    Some(Filter {
        must,
        ..Default::default()
    })
}

fn json_to_qdrant_value(json: JsonValue) -> QdrantValue {
    match json {
        JsonValue::String(s) => QdrantValue::from(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                QdrantValue::from(i)
            } else if let Some(f) = n.as_f64() {
                QdrantValue::from(f)
            } else {
                QdrantValue::from(0)
            }
        }
        JsonValue::Bool(b) => QdrantValue::from(b),
        other => QdrantValue::from(other.to_string()),
    }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
            Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
            Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
            Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
            _ => None,
        }
    })
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("doc1:0");
        let b = point_id("doc1:0");
        assert_eq!(a, b);
        assert_ne!(a, point_id("doc1:1"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_build_filter() {
        let mut filter = MetadataFilter::new();
        filter.insert("chunk_strategy".to_string(), json!("semantic"));
        filter.insert("chunk_id".to_string(), json!(3));
        let built = build_filter(&filter).unwrap();
        assert_eq!(built.must.len(), 2);

        assert!(build_filter(&MetadataFilter::new()).is_none());
    }

    #[test]
    fn test_value_conversion_round_trip() {
        let v = json_to_qdrant_value(json!("docs/a.md"));
        assert_eq!(qdrant_to_json_value(&v), Some(json!("docs/a.md")));
        assert_eq!(qdrant_value_to_string(&v).as_deref(), Some("docs/a.md"));

        let v = json_to_qdrant_value(json!(7));
        assert_eq!(qdrant_to_json_value(&v), Some(json!(7)));
    }
}
