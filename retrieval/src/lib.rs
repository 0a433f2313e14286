//! # Retrieval Engine
//!
//! Multi-strategy retrieval and ranking over chunked document collections:
//!
//! - **Query analysis**: language, complexity, intent, and a recommended strategy
//! - **Lexical retrieval**: Okapi BM25 over an immutable per-collection inverted index
//! - **Semantic retrieval**: query embedding plus vector similarity search
//! - **Hybrid fusion**: weighted reciprocal rank fusion of both rankings
//! - **Reranking**: fail-open rescoring with a pairwise relevance model
//! - **Diversification**: maximal marginal relevance over word-level Jaccard similarity
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     RetrievalOrchestrator                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                       ┌──────────────┐                          │
//! │                       │QueryAnalyzer │                          │
//! │                       └──────────────┘                          │
//! │                              │                                  │
//! │               ┌──────────────┴──────────────┐                   │
//! │               ▼                             ▼                   │
//! │       ┌──────────────┐              ┌──────────────┐            │
//! │       │   Lexical    │  concurrent  │   Semantic   │            │
//! │       │  (BM25 idx)  │              │ (embed + VS) │            │
//! │       └──────────────┘              └──────────────┘            │
//! │               └──────────────┬──────────────┘                   │
//! │                              ▼                                  │
//! │                  ┌───────────────────────┐                      │
//! │                  │  HybridFuser (RRF)    │                      │
//! │                  └───────────────────────┘                      │
//! │                              ▼                                  │
//! │            threshold → Reranker → DiversitySelector             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sieve_retrieval::{ChunkRecord, RetrievalConfig, RetrievalOrchestrator};
//!
//! let engine = RetrievalOrchestrator::builder()
//!     .with_embedding_provider(embedder)
//!     .with_vector_store(store)
//!     .build()?;
//!
//! engine.build_index("docs", chunks).await?;
//! let results = engine
//!     .retrieve("how does rank fusion work?", "docs", &RetrievalConfig::default())
//!     .await?;
//! ```

pub mod analyzer;
pub mod config;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod index;
pub mod lexical;
pub mod rerank;
pub mod result;
pub mod semantic;
pub mod strategy;
pub mod tokenizer;

pub use analyzer::{QueryAnalysis, QueryAnalyzer, QueryIntent};
pub use config::{AnalyzerConfig, EngineConfig, FusionConfig, RerankConfig, RetrievalConfig};
pub use diversity::DiversitySelector;
pub use engine::{
    CapabilityStatus, HealthReport, RetrievalOrchestrator, RetrievalOrchestratorBuilder,
    RetrievalResponse, StageTimings,
};
pub use error::{ConfigurationError, IndexError, Result, RetrievalError, RetrievalWarning};
pub use fusion::HybridFuser;
pub use index::{IndexRegistry, IndexStats, LexicalIndex};
pub use lexical::{Bm25Params, LexicalRetriever};
pub use rerank::Reranker;
pub use result::{ChunkRecord, RankingFeatures, RetrievalResult, RetrievalStrategy};
pub use semantic::SemanticRetriever;
pub use strategy::{BranchOutcome, BranchRequest, Retriever};

// Re-export from dependencies for convenience
pub use sieve_providers::{EmbeddingProvider, PassageScorer, SearchFilters, VectorStore};
pub use tokio_util::sync::CancellationToken;
