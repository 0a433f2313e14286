//! Per-collection inverted index for BM25 scoring.
//!
//! A [`LexicalIndex`] is built once from a collection's chunks and never
//! mutated afterwards. Documents live in an arena (`Vec`) in insertion order;
//! postings refer to them by ordinal. Reindexing builds a fresh index and
//! swaps the `Arc` held by the [`IndexRegistry`], so readers holding the old
//! index keep a consistent view until they drop it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use sieve_providers::Metadata;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::IndexError;
use crate::result::ChunkRecord;
use crate::tokenizer::tokenize;

/// One posting: a document ordinal and the term's frequency in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc: usize,
    pub term_frequency: u32,
}

/// A document as stored in the index arena.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    pub document_id: String,
    pub chunk_index: Option<u32>,
    pub metadata: Metadata,
    pub tokens: Vec<String>,
}

impl IndexedDocument {
    /// Document length in tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Aggregate statistics for an index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub average_document_length: f64,
    pub vocabulary_size: usize,
}

/// Immutable inverted index over one collection.
#[derive(Debug)]
pub struct LexicalIndex {
    collection_id: String,
    documents: Vec<IndexedDocument>,
    postings: HashMap<String, Vec<Posting>>,
    average_document_length: f64,
}

impl LexicalIndex {
    /// Build an index from a finalized chunk set.
    ///
    /// Fails on empty input or when an id repeats within `documents`.
    pub fn build(
        collection_id: impl Into<String>,
        documents: Vec<ChunkRecord>,
    ) -> Result<Self, IndexError> {
        if documents.is_empty() {
            return Err(IndexError::EmptyInput);
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(documents.len());
        let mut arena = Vec::with_capacity(documents.len());
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut total_tokens = 0usize;

        for (ordinal, chunk) in documents.into_iter().enumerate() {
            if !seen.insert(chunk.id.clone()) {
                return Err(IndexError::DuplicateId(chunk.id));
            }

            let tokens = tokenize(&chunk.content);
            total_tokens += tokens.len();

            let mut frequencies: HashMap<&str, u32> = HashMap::new();
            for token in &tokens {
                *frequencies.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, term_frequency) in frequencies {
                postings.entry(term.to_string()).or_default().push(Posting {
                    doc: ordinal,
                    term_frequency,
                });
            }

            arena.push(IndexedDocument {
                id: chunk.id,
                content: chunk.content,
                document_id: chunk.document_id,
                chunk_index: chunk.chunk_index,
                metadata: chunk.metadata,
                tokens,
            });
        }

        let average_document_length = total_tokens as f64 / arena.len() as f64;
        let index = Self {
            collection_id: collection_id.into(),
            documents: arena,
            postings,
            average_document_length,
        };

        info!(
            "Built lexical index for {}: {} documents, {} terms, avgdl {:.2}",
            index.collection_id,
            index.documents.len(),
            index.postings.len(),
            index.average_document_length
        );
        Ok(index)
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Number of indexed documents (`N` in BM25).
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Mean token count across all indexed documents.
    pub fn average_document_length(&self) -> f64 {
        self.average_document_length
    }

    /// Postings for a normalized term, in document insertion order.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of documents containing a term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings(term).len()
    }

    /// Document by arena ordinal.
    pub fn document(&self, ordinal: usize) -> Option<&IndexedDocument> {
        self.documents.get(ordinal)
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            document_count: self.documents.len(),
            average_document_length: self.average_document_length,
            vocabulary_size: self.postings.len(),
        }
    }
}

/// Read-many, write-rare map from collection id to its current index.
///
/// The lock is only held to clone or replace an `Arc`; scoring happens on the
/// cloned `Arc` without any lock.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: RwLock<HashMap<String, Arc<LexicalIndex>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a fully built index, returning the one it replaced.
    pub async fn install(&self, index: LexicalIndex) -> Option<Arc<LexicalIndex>> {
        let collection_id = index.collection_id().to_string();
        let previous = self
            .indexes
            .write()
            .await
            .insert(collection_id.clone(), Arc::new(index));
        debug!(
            "Installed lexical index for {collection_id} (replaced: {})",
            previous.is_some()
        );
        previous
    }

    /// Current index for a collection.
    pub async fn get(&self, collection_id: &str) -> Option<Arc<LexicalIndex>> {
        self.indexes.read().await.get(collection_id).cloned()
    }

    /// Remove a collection's index.
    pub async fn remove(&self, collection_id: &str) -> Option<Arc<LexicalIndex>> {
        self.indexes.write().await.remove(collection_id)
    }

    /// Ids of all indexed collections, sorted.
    pub async fn collections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.indexes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indexes.read().await.is_empty()
    }
}
