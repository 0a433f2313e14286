//! Error types for the retrieval engine.
//!
//! Only configuration and index-build problems are surfaced to callers as
//! errors. Failures of external collaborators during a request are recorded
//! as [`RetrievalWarning`]s and degrade the ranking instead.

use sieve_providers::{EmbeddingError, RerankError, VectorStoreError};
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors surfaced to callers of the engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The request or engine configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Building a lexical index failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for [`crate::EngineConfig`].
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Malformed input to a lexical index build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// No documents were supplied.
    #[error("cannot build an index from zero documents")]
    EmptyInput,

    /// The same id appeared twice in one build.
    #[error("duplicate document id: {0}")]
    DuplicateId(String),
}

/// An invalid [`crate::RetrievalConfig`] or [`crate::EngineConfig`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must be a non-negative finite number, got {value}")]
    InvalidWeight { field: &'static str, value: f64 },

    #[error("semantic_weight and lexical_weight cannot both be zero")]
    ZeroWeights,

    #[error("diversity_lambda must be within [0, 1], got {0}")]
    DiversityLambdaOutOfRange(f64),

    #[error("max_results must be greater than zero")]
    ZeroMaxResults,

    #[error("min_score_threshold must be finite, got {0}")]
    NonFiniteThreshold(f64),

    #[error("rrf_k must be greater than zero")]
    ZeroRrfK,

    #[error("rerank batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("oversample_factor must be at least 1")]
    ZeroOversample,

    #[error("invalid BM25 parameter {field}: {value}")]
    InvalidBm25 { field: &'static str, value: f64 },

    #[error("analyzer thresholds must satisfy 0 <= lexical ({lexical}) <= hybrid ({hybrid}) <= 1")]
    AnalyzerThresholds { lexical: f64, hybrid: f64 },

    #[error("analyzer complexity weights must be non-negative and not all zero")]
    AnalyzerWeights,

    #[error("analyzer max_tokens must be greater than zero")]
    ZeroTokenCap,
}

/// A recoverable failure absorbed during a request.
///
/// Branch retrievers return `Result<Vec<RetrievalResult>, RetrievalWarning>`;
/// the orchestrator logs the warning, keeps it in the response, and treats
/// the branch as having produced nothing.
#[derive(Error, Debug)]
pub enum RetrievalWarning {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector search failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("reranking failed: {0}")]
    Rerank(#[from] RerankError),

    #[error("{capability} is not configured")]
    NotConfigured { capability: &'static str },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("request cancelled")]
    Cancelled,
}
