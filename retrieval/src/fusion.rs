//! Weighted reciprocal rank fusion.
//!
//! Each list contributes `weight / (k + rank)` (rank 1-based) to every id it
//! contains. Only ranks matter; the branch scores themselves are never
//! compared, since BM25 and cosine similarity live on unrelated scales.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::FusionConfig;
use crate::result::{RetrievalResult, RetrievalStrategy, features};

/// Standard RRF damping constant.
pub const DEFAULT_RRF_K: u32 = 60;

struct Accumulator {
    result: RetrievalResult,
    score: f64,
}

/// Merges lexical and semantic rankings.
#[derive(Debug, Clone)]
pub struct HybridFuser {
    k: f64,
}

impl Default for HybridFuser {
    fn default() -> Self {
        Self::new(DEFAULT_RRF_K)
    }
}

impl HybridFuser {
    pub fn new(k: u32) -> Self {
        Self { k: f64::from(k) }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.rrf_k)
    }

    /// RRF contribution of a 1-based rank.
    pub fn contribution(&self, weight: f64, rank: usize) -> f64 {
        weight / (self.k + rank as f64)
    }

    /// Fuse two ranked lists into at most `limit` hybrid results.
    ///
    /// Ties keep first-encounter order, lexical list first. An id repeated
    /// within one list only counts at its best rank.
    pub fn fuse(
        &self,
        lexical: &[RetrievalResult],
        semantic: &[RetrievalResult],
        semantic_weight: f64,
        lexical_weight: f64,
        limit: usize,
    ) -> Vec<RetrievalResult> {
        let mut order: Vec<Accumulator> = Vec::with_capacity(lexical.len() + semantic.len());
        let mut positions: HashMap<&str, usize> = HashMap::new();

        self.accumulate(
            &mut order,
            &mut positions,
            lexical,
            lexical_weight,
            features::LEXICAL_RANK,
            features::LEXICAL_CONTRIBUTION,
        );
        self.accumulate(
            &mut order,
            &mut positions,
            semantic,
            semantic_weight,
            features::SEMANTIC_RANK,
            features::SEMANTIC_CONTRIBUTION,
        );

        // Stable: equal scores stay in first-encounter order.
        order.sort_by(|a, b| b.score.total_cmp(&a.score));
        order.truncate(limit);

        debug!(
            "Fused {} lexical and {} semantic results into {}",
            lexical.len(),
            semantic.len(),
            order.len()
        );

        order
            .into_iter()
            .map(|acc| {
                acc.result
                    .with_score(acc.score)
                    .with_feature(features::RRF_SCORE, acc.score)
                    .with_source(RetrievalStrategy::Hybrid)
            })
            .collect()
    }

    fn accumulate<'a>(
        &self,
        order: &mut Vec<Accumulator>,
        positions: &mut HashMap<&'a str, usize>,
        list: &'a [RetrievalResult],
        weight: f64,
        rank_feature: &str,
        contribution_feature: &str,
    ) {
        let mut seen_in_list: HashSet<&str> = HashSet::new();
        for (offset, result) in list.iter().enumerate() {
            if !seen_in_list.insert(result.id.as_str()) {
                continue;
            }
            let rank = offset + 1;
            let contribution = self.contribution(weight, rank);

            match positions.get(result.id.as_str()) {
                Some(&slot) => {
                    let entry = &mut order[slot];
                    entry.score += contribution;
                    // Keep the first list's record; carry over the other
                    // branch's sub-scores.
                    for (name, value) in &result.ranking_features {
                        entry
                            .result
                            .ranking_features
                            .entry(name.clone())
                            .or_insert(*value);
                    }
                    entry
                        .result
                        .ranking_features
                        .insert(rank_feature.to_string(), rank as f64);
                    entry
                        .result
                        .ranking_features
                        .insert(contribution_feature.to_string(), contribution);
                }
                None => {
                    positions.insert(result.id.as_str(), order.len());
                    order.push(Accumulator {
                        result: result
                            .clone()
                            .with_feature(rank_feature, rank as f64)
                            .with_feature(contribution_feature, contribution),
                        score: contribution,
                    });
                }
            }
        }
    }
}
