//! Embedding-based retrieval branch.

use std::sync::Arc;

use async_trait::async_trait;
use sieve_providers::{
    EmbeddingProvider, EmbeddingRequest, SearchFilters, VectorMatch, VectorStore,
};
use tracing::{debug, warn};

use crate::result::{RankingFeatures, RetrievalResult, RetrievalStrategy, features};
use crate::strategy::{BranchOutcome, BranchRequest, Retriever};

/// Embeds the query and asks a [`VectorStore`] for its nearest passages.
pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    filters: SearchFilters,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            filters: SearchFilters::default(),
        }
    }

    /// Filters passed through to every vector search.
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    fn to_result(collection_id: &str, rank: usize, hit: VectorMatch) -> RetrievalResult {
        let score = f64::from(hit.score);
        let mut ranking_features = RankingFeatures::new();
        ranking_features.insert(features::COSINE_SIMILARITY.to_string(), score);
        ranking_features.insert(features::SEMANTIC_RANK.to_string(), (rank + 1) as f64);
        RetrievalResult {
            id: hit.id,
            content: hit.content,
            score,
            collection_id: collection_id.to_string(),
            document_id: hit.document_id,
            chunk_index: hit.chunk_index,
            metadata: hit.metadata,
            source_strategy: RetrievalStrategy::Semantic,
            ranking_features,
        }
    }
}

#[async_trait]
impl Retriever for SemanticRetriever {
    fn strategy(&self) -> RetrievalStrategy {
        RetrievalStrategy::Semantic
    }

    async fn retrieve(&self, request: BranchRequest<'_>) -> BranchOutcome {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let mut embedding_request = EmbeddingRequest::new(request.query);
        if let Some(language) = request.language {
            embedding_request = embedding_request.with_language(language);
        }

        let embedding = self
            .embedder
            .embed(embedding_request)
            .await
            .inspect_err(|e| warn!("Embedding with {} failed: {e}", self.embedder.name()))?;

        let hits = self
            .store
            .search(
                request.collection_id,
                &embedding.embedding,
                request.limit,
                &self.filters,
            )
            .await
            .inspect_err(|e| warn!("Vector search on {} failed: {e}", self.store.name()))?;

        debug!(
            "Semantic branch returned {} hits for collection {}",
            hits.len(),
            request.collection_id
        );

        Ok(hits
            .into_iter()
            .take(request.limit)
            .enumerate()
            .map(|(rank, hit)| Self::to_result(request.collection_id, rank, hit))
            .collect())
    }
}
