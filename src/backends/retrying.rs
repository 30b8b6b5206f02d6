//! Transient-retry wrappers
//!
//! Wrap any backend so its calls go through [`RetryManager`]. The workflows
//! never retry transport failures themselves.

use async_trait::async_trait;
use std::sync::Arc;

use super::{GenerationBackend, SimilarityBackend};
use crate::errors::Result;
use crate::retry::RetryManager;
use crate::types::{ChatMessage, Generation, IndexRecord, MetadataFilter, Passage};

/// Generation backend with bounded transient retries
pub struct RetryingGenerator {
    inner: Arc<dyn GenerationBackend>,
    retry: RetryManager,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn GenerationBackend>, retry: RetryManager) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl GenerationBackend for RetryingGenerator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<Generation> {
        self.retry
            .execute_with_retry("generation", || self.inner.invoke(messages))
            .await
    }
}

/// Similarity backend with bounded transient retries
pub struct RetryingIndex {
    inner: Arc<dyn SimilarityBackend>,
    retry: RetryManager,
}

impl RetryingIndex {
    pub fn new(inner: Arc<dyn SimilarityBackend>, retry: RetryManager) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl SimilarityBackend for RetryingIndex {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        self.retry
            .execute_with_retry("similarity_search", || {
                self.inner.similarity_search(query, k, filter)
            })
            .await
    }

    async fn add_passages(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.retry
            .execute_with_retry("add_passages", || self.inner.add_passages(records.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QaError;
    use crate::retry::RetryConfig;
    use crate::types::TokenUsage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyGenerator {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for FlakyGenerator {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(QaError::Timeout { duration_ms: 5 });
            }
            Ok(Generation::with_usage("ok", TokenUsage::new(1, 1)))
        }
    }

    fn fast_retry() -> RetryManager {
        RetryManager::with_config(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
        })
    }

    #[tokio::test]
    async fn test_retrying_generator_recovers() {
        let flaky = Arc::new(FlakyGenerator {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        });
        let gen = RetryingGenerator::new(flaky.clone(), fast_retry());

        let out = gen.invoke(&[ChatMessage::user("q")]).await.unwrap();
        assert_eq!(out.content, "ok");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_generator_gives_up() {
        let flaky = Arc::new(FlakyGenerator {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        });
        let gen = RetryingGenerator::new(flaky.clone(), fast_retry());

        let err = gen.invoke(&[ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, QaError::Timeout { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }
}
