//! Mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sieve_providers::{
    EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, Metadata,
    PassageScorer, RerankError, SearchFilters, VectorMatch, VectorStore, VectorStoreError,
};
use sieve_retrieval::{ChunkRecord, RetrievalResult};

/// The three-document pet corpus.
pub fn pets() -> Vec<ChunkRecord> {
    vec![
        ChunkRecord::new("1", "the cat sat", "d1").with_chunk_index(0),
        ChunkRecord::new("2", "the dog ran fast", "d2").with_chunk_index(0),
        ChunkRecord::new("3", "cats and dogs are pets", "d3").with_chunk_index(0),
    ]
}

pub fn ids(results: &[RetrievalResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

pub fn hit(id: &str, content: &str, score: f32) -> VectorMatch {
    VectorMatch {
        id: id.to_string(),
        content: content.to_string(),
        score,
        document_id: format!("doc-{id}"),
        chunk_index: Some(0),
        metadata: Metadata::new(),
    }
}

/// Returns a constant vector, optionally after a delay.
#[derive(Default)]
pub struct ConstantEmbedder {
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ConstantEmbedder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn name(&self) -> &str {
        "constant"
    }

    fn default_model(&self) -> &str {
        "constant-2"
    }

    async fn embed(&self, request: EmbeddingRequest) -> sieve_providers::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(EmbeddingResponse {
            embedding: vec![1.0, 0.0],
            model: "constant-2".to_string(),
            language: request.language.unwrap_or_else(|| "en".to_string()),
            dimension: 2,
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Fails every call.
#[derive(Default)]
pub struct FailingEmbedder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    fn default_model(&self) -> &str {
        "none"
    }

    async fn embed(&self, _request: EmbeddingRequest) -> sieve_providers::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EmbeddingError::ApiRequest("service unavailable".to_string()))
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn health_check(&self) -> sieve_providers::Result<()> {
        Err(EmbeddingError::ApiRequest("service unavailable".to_string()))
    }
}

/// Serves fixed ranked lists per collection, ignoring the query vector.
#[derive(Default)]
pub struct FixedVectorStore {
    lists: HashMap<String, Vec<VectorMatch>>,
}

impl FixedVectorStore {
    pub fn with_list(mut self, collection_id: &str, hits: Vec<VectorMatch>) -> Self {
        self.lists.insert(collection_id.to_string(), hits);
        self
    }
}

#[async_trait]
impl VectorStore for FixedVectorStore {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(
        &self,
        collection_id: &str,
        _query_vector: &[f32],
        limit: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        self.lists
            .get(collection_id)
            .map(|hits| hits.iter().take(limit).cloned().collect())
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_id.to_string()))
    }
}

/// Scores passages from a content-to-score table; unknown passages score 0.
#[derive(Default)]
pub struct TableScorer {
    scores: HashMap<String, f32>,
    pub calls: AtomicUsize,
}

impl TableScorer {
    pub fn with_score(mut self, content: &str, score: f32) -> Self {
        self.scores.insert(content.to_string(), score);
        self
    }
}

#[async_trait]
impl PassageScorer for TableScorer {
    fn name(&self) -> &str {
        "table"
    }

    async fn score_pairs(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(passages
            .iter()
            .map(|p| self.scores.get(p).copied().unwrap_or(0.0))
            .collect())
    }
}

/// Fails every call.
pub struct FailingScorer;

#[async_trait]
impl PassageScorer for FailingScorer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn score_pairs(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>, RerankError> {
        Err(RerankError::ApiRequest("model crashed".to_string()))
    }

    async fn health_check(&self) -> Result<(), RerankError> {
        Err(RerankError::ApiRequest("model crashed".to_string()))
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
