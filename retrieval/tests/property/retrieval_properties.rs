use std::collections::HashMap;

use proptest::prelude::*;
use sieve_providers::Metadata;
use sieve_retrieval::diversity::jaccard;
use sieve_retrieval::lexical::score;
use sieve_retrieval::tokenizer::token_set;
use sieve_retrieval::{
    Bm25Params, ChunkRecord, DiversitySelector, HybridFuser, LexicalIndex, RankingFeatures,
    RetrievalResult, RetrievalStrategy,
};

const WORDS: &[&str] = &["rust", "tokio", "index", "rank", "fusion", "query", "vector"];

fn result(id: usize, content: String, score: f64) -> RetrievalResult {
    RetrievalResult {
        id: format!("d{id}"),
        content,
        score,
        collection_id: "c".to_string(),
        document_id: format!("doc{id}"),
        chunk_index: None,
        metadata: Metadata::new(),
        source_strategy: RetrievalStrategy::Lexical,
        ranking_features: RankingFeatures::new(),
    }
}

/// Two rankings drawn from the same id space, each a shuffled prefix.
fn arb_rankings() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (2usize..30)
        .prop_flat_map(|n| {
            let ids: Vec<usize> = (0..n).collect();
            (
                Just(ids.clone()).prop_shuffle(),
                Just(ids).prop_shuffle(),
                1..=n,
                1..=n,
            )
        })
        .prop_map(|(mut lexical, mut semantic, lexical_len, semantic_len)| {
            lexical.truncate(lexical_len);
            semantic.truncate(semantic_len);
            (lexical, semantic)
        })
}

fn arb_candidates() -> impl Strategy<Value = Vec<RetrievalResult>> {
    prop::collection::vec(
        (
            prop::collection::vec(prop::sample::select(WORDS), 1..6),
            0.0f64..10.0,
        ),
        0..12,
    )
    .prop_map(|docs| {
        docs.into_iter()
            .enumerate()
            .map(|(id, (words, score))| result(id, words.join(" "), score))
            .collect()
    })
}

// ── BM25 ────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn more_occurrences_score_higher_at_equal_length(
        base_tf in 1usize..5,
        extra_tf in 1usize..5,
        fillers in 3usize..8,
    ) {
        let rich_tf = base_tf + extra_tf;
        let length = rich_tf + 2;
        let doc = |tf: usize| {
            let mut words = vec!["zeta"; tf];
            words.resize(length, "pad");
            words.join(" ")
        };

        let mut chunks = vec![
            ChunkRecord::new("poor", doc(base_tf), "p"),
            ChunkRecord::new("rich", doc(rich_tf), "r"),
        ];
        for i in 0..fillers {
            chunks.push(ChunkRecord::new(format!("f{i}"), "filler words only", "f"));
        }
        let index = LexicalIndex::build("c", chunks).unwrap();

        let ranked = score("zeta", &index, &Bm25Params::default(), 10);
        prop_assert_eq!(ranked.len(), 2);
        prop_assert_eq!(ranked[0].id.as_str(), "rich");
        prop_assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn bm25_results_are_positive_and_sorted(
        docs in prop::collection::vec(prop::collection::vec(prop::sample::select(WORDS), 1..8), 1..15),
        query in prop::collection::vec(prop::sample::select(WORDS), 1..4),
    ) {
        let chunks: Vec<ChunkRecord> = docs
            .iter()
            .enumerate()
            .map(|(i, words)| ChunkRecord::new(format!("d{i}"), words.join(" "), "doc"))
            .collect();
        let index = LexicalIndex::build("c", chunks).unwrap();

        let ranked = score(&query.join(" "), &index, &Bm25Params::default(), 100);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        prop_assert!(ranked.iter().all(|r| r.score > 0.0));
    }
}

// ── Fusion ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn agreement_beats_single_list((lexical_ids, semantic_ids) in arb_rankings()) {
        let lexical: Vec<RetrievalResult> = lexical_ids
            .iter()
            .map(|&id| result(id, String::new(), 1.0))
            .collect();
        let semantic: Vec<RetrievalResult> = semantic_ids
            .iter()
            .map(|&id| result(id, String::new(), 1.0).with_source(RetrievalStrategy::Semantic))
            .collect();

        let fused = HybridFuser::default().fuse(&lexical, &semantic, 1.0, 1.0, usize::MAX);

        let in_lexical: Vec<String> = lexical.iter().map(|r| r.id.clone()).collect();
        let in_semantic: Vec<String> = semantic.iter().map(|r| r.id.clone()).collect();
        let (both, single): (Vec<&RetrievalResult>, Vec<&RetrievalResult>) = fused
            .iter()
            .partition(|r| in_lexical.contains(&r.id) && in_semantic.contains(&r.id));

        for agreed in &both {
            for lone in &single {
                prop_assert!(agreed.score > lone.score);
            }
        }

        let mut unique = in_lexical;
        unique.extend(in_semantic);
        unique.sort();
        unique.dedup();
        prop_assert_eq!(fused.len(), unique.len());
        prop_assert!(fused.iter().all(|r| r.source_strategy == RetrievalStrategy::Hybrid));
    }
}

// ── Diversification ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn diversify_only_reorders(candidates in arb_candidates(), lambda in 0.0f64..=1.0) {
        let before: HashMap<String, f64> =
            candidates.iter().map(|r| (r.id.clone(), r.score)).collect();

        let after = DiversitySelector::new().diversify(candidates, lambda);

        prop_assert_eq!(after.len(), before.len());
        for r in &after {
            prop_assert_eq!(before.get(&r.id).copied(), Some(r.score));
        }
    }

    #[test]
    fn zero_lambda_is_identity(candidates in arb_candidates()) {
        let after = DiversitySelector::new().diversify(candidates.clone(), 0.0);
        prop_assert_eq!(after, candidates);
    }

    #[test]
    fn full_lambda_picks_least_redundant(candidates in arb_candidates()) {
        let after = DiversitySelector::new().diversify(candidates, 1.0);
        let sets: Vec<_> = after.iter().map(|r| token_set(&r.content)).collect();
        let redundancy = |k: usize, prefix: usize| {
            sets[..prefix]
                .iter()
                .map(|chosen| jaccard(&sets[k], chosen))
                .fold(0.0, f64::max)
        };

        for step in 1..after.len() {
            let picked = redundancy(step, step);
            for later in step + 1..after.len() {
                prop_assert!(
                    picked <= redundancy(later, step),
                    "step {} picked {} over {}",
                    step,
                    after[step].id,
                    after[later].id
                );
            }
        }
    }
}
