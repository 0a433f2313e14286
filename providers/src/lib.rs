//! # Providers
//!
//! External capabilities consumed by the sieve retrieval engine. The engine
//! never implements embedding models, nearest-neighbour indexes, or
//! cross-encoders itself; it talks to them through the traits defined here.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Providers                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorStore               │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  OpenAIProvider                  InMemoryVectorStore            │
//! │                                                                 │
//! │  PassageScorer ──► HttpRerankProvider                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod embedding;
pub mod error;
pub mod rerank;
pub mod similarity;
pub mod vector_store;

use std::collections::BTreeMap;

pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use error::{EmbeddingError, RerankError, Result, VectorStoreError};
pub use rerank::{HttpRerankProvider, PassageScorer};
pub use similarity::cosine_similarity;
pub use vector_store::{
    InMemoryVectorStore, SearchFilters, VectorMatch, VectorRecord, VectorStore,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Opaque key/value metadata attached to passages.
pub type Metadata = BTreeMap<String, serde_json::Value>;
