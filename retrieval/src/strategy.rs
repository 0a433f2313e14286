//! Branch retrievers and their common interface.
//!
//! The set of strategies is closed ([`RetrievalStrategy`]); the orchestrator
//! matches on it and drives the selected branches through [`Retriever`].

use async_trait::async_trait;

use crate::error::RetrievalWarning;
use crate::result::{RetrievalResult, RetrievalStrategy};

/// What a branch produced: a ranked list, or a warning explaining why it
/// produced nothing.
pub type BranchOutcome = Result<Vec<RetrievalResult>, RetrievalWarning>;

/// Parameters shared by every branch for one request.
#[derive(Debug, Clone, Copy)]
pub struct BranchRequest<'a> {
    pub query: &'a str,
    pub collection_id: &'a str,
    pub limit: usize,
    /// Detected query language, forwarded to embedding providers.
    pub language: Option<&'a str>,
}

/// A single retrieval branch.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The strategy this branch implements.
    fn strategy(&self) -> RetrievalStrategy;

    /// Return up to `request.limit` results, best first.
    async fn retrieve(&self, request: BranchRequest<'_>) -> BranchOutcome;
}
