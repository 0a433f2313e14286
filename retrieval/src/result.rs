//! Records flowing through the ranking pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sieve_providers::Metadata;

/// Named sub-scores attached to a result for fusion, reranking, and debugging.
pub type RankingFeatures = BTreeMap<String, f64>;

/// Well-known keys in [`RankingFeatures`].
pub mod features {
    pub const BM25_SCORE: &str = "bm25_score";
    pub const MATCHED_TERMS: &str = "matched_terms";
    pub const COSINE_SIMILARITY: &str = "cosine_similarity";
    /// 1-based position in the lexical branch list.
    pub const LEXICAL_RANK: &str = "lexical_rank";
    /// 1-based position in the semantic branch list.
    pub const SEMANTIC_RANK: &str = "semantic_rank";
    pub const LEXICAL_CONTRIBUTION: &str = "lexical_rrf_contribution";
    pub const SEMANTIC_CONTRIBUTION: &str = "semantic_rrf_contribution";
    pub const RRF_SCORE: &str = "rrf_score";
    pub const CROSS_ENCODER_SCORE: &str = "cross_encoder_score";
    pub const ORIGINAL_SCORE: &str = "original_score";
    pub const MMR_SCORE: &str = "mmr_score";
    pub const MAX_SIMILARITY: &str = "max_selected_similarity";
}

/// Which retrieval strategy produced (or should produce) a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Embedding similarity only.
    Semantic,
    /// BM25 over the lexical index only.
    Lexical,
    /// Both branches, merged with reciprocal rank fusion.
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked passage.
///
/// Pipeline stages never modify a result they were given; they build a new
/// one through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Unique within a collection.
    pub id: String,

    /// Passage text.
    pub content: String,

    /// Strategy-dependent score. Lexical and semantic scores are not
    /// comparable until fused.
    pub score: f64,

    pub collection_id: String,

    pub document_id: String,

    pub chunk_index: Option<u32>,

    pub metadata: Metadata,

    pub source_strategy: RetrievalStrategy,

    pub ranking_features: RankingFeatures,
}

impl RetrievalResult {
    /// A copy of this result with a different score.
    pub fn with_score(&self, score: f64) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }

    /// Add or replace a ranking feature.
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.ranking_features.insert(name.into(), value);
        self
    }

    /// Set the strategy credited for this result.
    pub fn with_source(mut self, strategy: RetrievalStrategy) -> Self {
        self.source_strategy = strategy;
        self
    }

    /// Look up a ranking feature.
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.ranking_features.get(name).copied()
    }
}

/// A chunk as supplied by the upstream chunking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,

    pub content: String,

    pub document_id: String,

    #[serde(default)]
    pub chunk_index: Option<u32>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ChunkRecord {
    /// Create a chunk without position or metadata.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            document_id: document_id.into(),
            chunk_index: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the chunk's position in its document.
    pub fn with_chunk_index(mut self, index: u32) -> Self {
        self.chunk_index = Some(index);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
