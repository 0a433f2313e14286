//! Error types for the external capabilities.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while generating embeddings.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Empty input text.
    #[error("cannot embed empty text")]
    EmptyText,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that can occur in a vector similarity search backend.
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// The collection has never been seeded.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Backend failure (connection, query, etc.).
    #[error("vector store backend error: {0}")]
    Backend(String),
}

/// Errors that can occur while scoring (query, passage) pairs.
#[derive(Error, Debug)]
pub enum RerankError {
    /// Scorer not configured.
    #[error("reranker not configured")]
    NotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from the model.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model returned a different number of scores than passages.
    #[error("score count mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
