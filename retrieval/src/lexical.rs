//! Okapi BM25 scoring over a [`LexicalIndex`].
//!
//! For each distinct query term `t` present in the index:
//!
//! ```text
//! idf(t)   = ln((N - df + 0.5) / (df + 0.5))
//! score   += idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / avgdl))
//! ```
//!
//! Documents whose accumulated score is not positive are dropped. Ties keep
//! index insertion order.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::index::{IndexRegistry, LexicalIndex};
use crate::result::{RankingFeatures, RetrievalResult, RetrievalStrategy, features};
use crate::strategy::{BranchOutcome, BranchRequest, Retriever};
use crate::tokenizer::tokenize_unique;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Length normalization, within [0, 1].
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(ConfigurationError::InvalidBm25 {
                field: "k1",
                value: self.k1,
            });
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ConfigurationError::InvalidBm25 {
                field: "b",
                value: self.b,
            });
        }
        Ok(())
    }

    /// Inverse document frequency. Negative for terms in more than half of
    /// the documents.
    pub fn idf(document_count: usize, document_frequency: usize) -> f64 {
        let n = document_count as f64;
        let df = document_frequency as f64;
        ((n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Contribution of one term occurring `tf` times in a document of
    /// `doc_len` tokens.
    pub fn term_weight(&self, idf: f64, tf: f64, doc_len: f64, avgdl: f64) -> f64 {
        let length_ratio = if avgdl > 0.0 { doc_len / avgdl } else { 0.0 };
        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * length_ratio))
    }
}

/// Score every document in `index` against `query` and return the best
/// `limit` results.
pub fn score(
    query: &str,
    index: &LexicalIndex,
    params: &Bm25Params,
    limit: usize,
) -> Vec<RetrievalResult> {
    let n = index.document_count();
    let avgdl = index.average_document_length();

    let mut scores = vec![0.0f64; n];
    let mut matched = vec![0u32; n];

    for term in tokenize_unique(query) {
        let postings = index.postings(&term);
        if postings.is_empty() {
            continue;
        }
        let idf = Bm25Params::idf(n, postings.len());
        for posting in postings {
            let Some(doc) = index.document(posting.doc) else {
                continue;
            };
            scores[posting.doc] += params.term_weight(
                idf,
                f64::from(posting.term_frequency),
                doc.token_count() as f64,
                avgdl,
            );
            matched[posting.doc] += 1;
        }
    }

    // Ordinals ascend, so the stable sort breaks ties by insertion order.
    let mut ranked: Vec<(usize, f64)> = scores
        .into_iter()
        .enumerate()
        .filter(|(_, s)| *s > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .enumerate()
        .filter_map(|(rank, (ordinal, score))| {
            let doc = index.document(ordinal)?;
            let mut ranking_features = RankingFeatures::new();
            ranking_features.insert(features::BM25_SCORE.to_string(), score);
            ranking_features.insert(
                features::MATCHED_TERMS.to_string(),
                f64::from(matched[ordinal]),
            );
            ranking_features.insert(features::LEXICAL_RANK.to_string(), (rank + 1) as f64);
            Some(RetrievalResult {
                id: doc.id.clone(),
                content: doc.content.clone(),
                score,
                collection_id: index.collection_id().to_string(),
                document_id: doc.document_id.clone(),
                chunk_index: doc.chunk_index,
                metadata: doc.metadata.clone(),
                source_strategy: RetrievalStrategy::Lexical,
                ranking_features,
            })
        })
        .collect()
}

/// BM25 branch backed by the shared [`IndexRegistry`].
pub struct LexicalRetriever {
    registry: Arc<IndexRegistry>,
    params: Bm25Params,
}

impl LexicalRetriever {
    pub fn new(registry: Arc<IndexRegistry>, params: Bm25Params) -> Self {
        Self { registry, params }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    fn strategy(&self) -> RetrievalStrategy {
        RetrievalStrategy::Lexical
    }

    async fn retrieve(&self, request: BranchRequest<'_>) -> BranchOutcome {
        let Some(index) = self.registry.get(request.collection_id).await else {
            // No index means no lexical signal, not a failure.
            debug!(
                "No lexical index for collection {}",
                request.collection_id
            );
            return Ok(Vec::new());
        };

        let results = score(request.query, &index, &self.params, request.limit);
        debug!(
            "Lexical branch scored {} results for collection {}",
            results.len(),
            request.collection_id
        );
        Ok(results)
    }
}
