//! Vector similarity search.
//!
//! [`VectorStore`] is the nearest-neighbour primitive the engine consumes.
//! [`InMemoryVectorStore`] is a brute-force implementation for small
//! collections, local tooling, and tests.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::VectorStoreError;
use crate::similarity::{cosine_similarity, normalize};
use crate::{Embedding, Metadata};

/// A stored vector together with the passage it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier within the collection.
    pub id: String,

    /// Passage text.
    pub content: String,

    /// Source document.
    pub document_id: String,

    /// Position of the chunk within its document.
    pub chunk_index: Option<u32>,

    /// Opaque metadata.
    pub metadata: Metadata,

    /// The embedding vector.
    pub embedding: Embedding,
}

/// A single nearest-neighbour hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub content: String,
    /// Raw similarity reported by the backend.
    pub score: f32,
    pub document_id: String,
    pub chunk_index: Option<u32>,
    pub metadata: Metadata,
}

/// Filters applied by the backend before ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Every key must be present in the record metadata with an equal value.
    pub metadata: Metadata,

    /// Restrict hits to these documents.
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilters {
    /// Require a metadata key to equal a value.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Restrict hits to the given documents.
    pub fn with_document_ids(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }

    /// Whether no filter is set.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.document_ids.is_none()
    }

    fn matches(&self, record: &VectorRecord) -> bool {
        if let Some(ids) = &self.document_ids {
            if !ids.iter().any(|id| id == &record.document_id) {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(key, value)| record.metadata.get(key) == Some(value))
    }
}

/// Trait for vector similarity search backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the backend, for logs and health reports.
    fn name(&self) -> &str;

    /// Return up to `limit` records nearest to `query_vector`, best first.
    async fn search(
        &self,
        collection_id: &str,
        query_vector: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Check that the backend can be reached.
    async fn health_check(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

struct Collection {
    dimension: usize,
    records: Vec<VectorRecord>,
}

/// Brute-force cosine search over per-collection record lists.
///
/// Vectors are normalized on insert. Records keep their insertion order so
/// equal scores are returned deterministically.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace records in a collection.
    ///
    /// The first insert fixes the collection's dimension.
    pub async fn upsert(
        &self,
        collection_id: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, VectorStoreError> {
        let mut collections = self.collections.write().await;
        let Some(first_dimension) = records.first().map(|r| r.embedding.len()) else {
            return Ok(0);
        };
        let dimension = collections
            .get(collection_id)
            .map_or(first_dimension, |c| c.dimension);

        // Validate everything before touching the map, so a rejected first
        // insert leaves no collection behind.
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }

        let collection = collections
            .entry(collection_id.to_string())
            .or_insert_with(|| Collection {
                dimension,
                records: Vec::new(),
            });

        let count = records.len();
        for mut record in records {
            normalize(&mut record.embedding);
            match collection.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => collection.records.push(record),
            }
        }

        info!("Upserted {count} vectors into collection {collection_id}");
        Ok(count)
    }

    /// Remove a collection entirely.
    pub async fn drop_collection(&self, collection_id: &str) -> bool {
        self.collections.write().await.remove(collection_id).is_some()
    }

    /// Number of records in a collection.
    pub async fn len(&self, collection_id: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection_id)
            .map_or(0, |c| c.records.len())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn search(
        &self,
        collection_id: &str,
        query_vector: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection_id)
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_id.to_string()))?;

        if query_vector.len() != collection.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: collection.dimension,
                actual: query_vector.len(),
            });
        }

        let mut scored = Vec::with_capacity(collection.records.len());
        for record in collection.records.iter().filter(|r| filters.matches(r)) {
            let score = cosine_similarity(query_vector, &record.embedding)?;
            scored.push((OrderedFloat(score), record));
        }

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by_key(|(score, _)| Reverse(*score));
        scored.truncate(limit);

        debug!(
            "Vector search in {collection_id} returned {} matches",
            scored.len()
        );

        Ok(scored
            .into_iter()
            .map(|(score, record)| VectorMatch {
                id: record.id.clone(),
                content: record.content.clone(),
                score: score.0,
                document_id: record.document_id.clone(),
                chunk_index: record.chunk_index,
                metadata: record.metadata.clone(),
            })
            .collect())
    }
}
