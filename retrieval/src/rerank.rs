//! Cross-encoder reranking of the fused candidate head.
//!
//! Failure is fail-open: if the scorer errors or returns unusable scores, the
//! caller gets its input back unchanged plus a warning.

use std::sync::Arc;

use sieve_providers::{PassageScorer, RerankError};
use tracing::{debug, warn};

use crate::error::RetrievalWarning;
use crate::result::{RetrievalResult, features};

/// Default number of passages sent per scoring call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Rescores results with a pairwise relevance model.
pub struct Reranker {
    scorer: Arc<dyn PassageScorer>,
    batch_size: usize,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn PassageScorer>) -> Self {
        Self {
            scorer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Passages per scoring call. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn scorer(&self) -> &Arc<dyn PassageScorer> {
        &self.scorer
    }

    /// Rerank the first `top_k` results, keeping the rest in place after them.
    ///
    /// Returns the input unchanged together with the reason when scoring
    /// fails.
    pub async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
        top_k: usize,
    ) -> (Vec<RetrievalResult>, Option<RetrievalWarning>) {
        match self.try_rerank(query, &results, top_k).await {
            Ok(reranked) => (reranked, None),
            Err(warning) => {
                warn!(
                    "Reranking with {} failed, keeping fused order: {warning}",
                    self.scorer.name()
                );
                (results, Some(warning))
            }
        }
    }

    /// Rerank without the fallback. The input is never modified.
    pub async fn try_rerank(
        &self,
        query: &str,
        results: &[RetrievalResult],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalWarning> {
        let head_len = top_k.min(results.len());
        let (head, tail) = results.split_at(head_len);
        if head.is_empty() {
            return Ok(results.to_vec());
        }

        let mut scores = Vec::with_capacity(head.len());
        for batch in head.chunks(self.batch_size) {
            let passages: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let batch_scores = self.scorer.score_pairs(query, &passages).await?;
            if batch_scores.len() != batch.len() {
                return Err(RerankError::LengthMismatch {
                    expected: batch.len(),
                    actual: batch_scores.len(),
                }
                .into());
            }
            if let Some(bad) = batch_scores.iter().find(|s| !s.is_finite()) {
                return Err(RerankError::InvalidResponse(format!(
                    "non-finite relevance score {bad}"
                ))
                .into());
            }
            scores.extend(batch_scores);
        }

        let mut reranked: Vec<RetrievalResult> = head
            .iter()
            .zip(scores)
            .map(|(result, score)| {
                let score = f64::from(score);
                result
                    .with_score(score)
                    .with_feature(features::CROSS_ENCODER_SCORE, score)
                    .with_feature(features::ORIGINAL_SCORE, result.score)
            })
            .collect();
        // Stable: equal relevance keeps the fused order.
        reranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        reranked.extend_from_slice(tail);

        debug!(
            "Reranked {head_len} of {} candidates with {}",
            results.len(),
            self.scorer.name()
        );
        Ok(reranked)
    }
}
