//! Maximal marginal relevance reordering.
//!
//! `diversity_lambda` is the weight given to novelty. Each step picks the
//! remaining candidate maximizing
//!
//! ```text
//! (1 - diversity_lambda) * relevance - diversity_lambda * max_jaccard(candidate, selected)
//! ```
//!
//! where relevance is the candidate's current score. Nothing is dropped; only
//! the order changes.

use std::collections::HashSet;

use tracing::debug;

use crate::result::{RetrievalResult, features};
use crate::tokenizer::token_set;

/// Word-level Jaccard similarity of two token sets. Zero when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Reorders candidates to trade relevance against redundancy.
#[derive(Debug, Default, Clone)]
pub struct DiversitySelector;

impl DiversitySelector {
    pub fn new() -> Self {
        Self
    }

    /// Reorder `results` by MMR. `diversity_lambda == 0` returns them as-is.
    pub fn diversify(
        &self,
        results: Vec<RetrievalResult>,
        diversity_lambda: f64,
    ) -> Vec<RetrievalResult> {
        let lambda = diversity_lambda.clamp(0.0, 1.0);
        if lambda <= 0.0 || results.len() < 2 {
            return results;
        }

        let token_sets: Vec<HashSet<String>> =
            results.iter().map(|r| token_set(&r.content)).collect();

        let mut remaining: Vec<usize> = (0..results.len()).collect();
        let mut picks: Vec<(usize, f64, f64)> = Vec::with_capacity(results.len());

        // Seed with the most relevant result, earliest on ties.
        let first = remaining
            .iter()
            .copied()
            .fold(0, |best, i| {
                if results[i].score > results[best].score {
                    i
                } else {
                    best
                }
            });
        remaining.retain(|&i| i != first);
        picks.push((first, results[first].score * (1.0 - lambda), 0.0));

        while !remaining.is_empty() {
            let mut best: Option<(usize, f64, f64)> = None;
            for (slot, &candidate) in remaining.iter().enumerate() {
                let max_similarity = picks
                    .iter()
                    .map(|&(chosen, _, _)| jaccard(&token_sets[candidate], &token_sets[chosen]))
                    .fold(0.0, f64::max);
                let mmr = (1.0 - lambda) * results[candidate].score - lambda * max_similarity;
                if best.is_none_or(|(_, best_mmr, _)| mmr > best_mmr) {
                    best = Some((slot, mmr, max_similarity));
                }
            }
            let Some((slot, mmr, max_similarity)) = best else {
                break;
            };
            picks.push((remaining.remove(slot), mmr, max_similarity));
        }

        debug!(
            "Diversified {} results with lambda {lambda:.2}",
            results.len()
        );

        let mut slots: Vec<Option<RetrievalResult>> = results.into_iter().map(Some).collect();
        picks
            .into_iter()
            .filter_map(|(index, mmr, max_similarity)| {
                slots[index].take().map(|result| {
                    result
                        .with_feature(features::MMR_SCORE, mmr)
                        .with_feature(features::MAX_SIMILARITY, max_similarity)
                })
            })
            .collect()
    }
}
