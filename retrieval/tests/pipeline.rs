//! End-to-end tests of the retrieval pipeline against mock collaborators.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sieve_retrieval::result::features;
use sieve_retrieval::{
    CancellationToken, CapabilityStatus, ChunkRecord, ConfigurationError, EngineConfig,
    RetrievalConfig, RetrievalError, RetrievalOrchestrator, RetrievalStrategy, RetrievalWarning,
};

use common::{
    ConstantEmbedder, FailingEmbedder, FailingScorer, FixedVectorStore, TableScorer, hit, ids,
    pets,
};

/// A, B and C mention "alpha" three, two and one times; everything else is
/// filler so that "alpha" keeps a positive idf.
fn letters() -> Vec<ChunkRecord> {
    let mut chunks = vec![
        ChunkRecord::new("A", "alpha alpha alpha", "letters"),
        ChunkRecord::new("B", "alpha alpha beta", "letters"),
        ChunkRecord::new("C", "alpha beta gamma", "letters"),
        ChunkRecord::new("D", "delta epsilon zeta", "letters"),
    ];
    for i in 0..4 {
        chunks.push(ChunkRecord::new(
            format!("F{i}"),
            "filler words here",
            "letters",
        ));
    }
    chunks
}

fn letters_store() -> FixedVectorStore {
    FixedVectorStore::default().with_list(
        "letters",
        vec![
            hit("B", "alpha alpha beta", 0.92),
            hit("A", "alpha alpha alpha", 0.90),
            hit("D", "delta epsilon zeta", 0.75),
        ],
    )
}

async fn hybrid_engine() -> RetrievalOrchestrator {
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(ConstantEmbedder::default()))
        .with_vector_store(Arc::new(letters_store()))
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();
    engine
}

#[tokio::test]
async fn test_exact_term_match_ranks_first() {
    let engine = RetrievalOrchestrator::builder().build().unwrap();
    engine.build_index("pets", pets()).await.unwrap();

    let config = RetrievalConfig::new().with_strategy(RetrievalStrategy::Lexical);
    let results = engine.retrieve("cat", "pets", &config).await.unwrap();

    assert_eq!(results[0].id, "1");
    assert_eq!(results[0].chunk_index, Some(0));
    assert!(!ids(&results).contains(&"2"));
}

#[tokio::test]
async fn test_analyzer_routes_short_lookup_to_lexical() {
    let engine = RetrievalOrchestrator::builder().build().unwrap();
    engine.build_index("pets", pets()).await.unwrap();

    let response = engine
        .retrieve_detailed("cat", "pets", &RetrievalConfig::default())
        .await
        .unwrap();

    assert_eq!(response.strategy, RetrievalStrategy::Lexical);
    assert_eq!(ids(&response.results), vec!["1"]);
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_hybrid_fusion_rewards_agreement() {
    let engine = hybrid_engine().await;
    let config = RetrievalConfig::new()
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_max_results(4);

    let response = engine
        .retrieve_detailed("alpha", "letters", &config)
        .await
        .unwrap();

    assert!(response.warnings.is_empty());
    assert_eq!(ids(&response.results), vec!["A", "B", "C", "D"]);

    let a = &response.results[0];
    assert_eq!(a.source_strategy, RetrievalStrategy::Hybrid);
    assert_eq!(a.feature(features::LEXICAL_RANK), Some(1.0));
    assert_eq!(a.feature(features::SEMANTIC_RANK), Some(2.0));
    assert!(a.feature(features::BM25_SCORE).is_some());
    assert!(a.feature(features::COSINE_SIMILARITY).is_some());
}

#[tokio::test]
async fn test_high_threshold_empties_fused_results() {
    let engine = hybrid_engine().await;
    let config = RetrievalConfig::new()
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_min_score(0.9);

    let results = engine.retrieve("alpha", "letters", &config).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_semantic_failure_degrades_to_lexical() {
    let embedder = Arc::new(FailingEmbedder::default());
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(embedder.clone())
        .with_vector_store(Arc::new(FixedVectorStore::default()))
        .build()
        .unwrap();
    engine.build_index("pets", pets()).await.unwrap();

    let config = RetrievalConfig::new().with_strategy(RetrievalStrategy::Hybrid);
    let response = engine
        .retrieve_detailed("cat", "pets", &config)
        .await
        .unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ids(&response.results), vec!["1"]);
    assert!(matches!(
        response.warnings.as_slice(),
        [RetrievalWarning::Embedding(_)]
    ));
}

#[tokio::test]
async fn test_unknown_collection_is_empty_not_error() {
    let engine = hybrid_engine().await;
    let config = RetrievalConfig::new().with_strategy(RetrievalStrategy::Lexical);
    let results = engine.retrieve("alpha", "nowhere", &config).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_retrieve_is_deterministic() {
    let scorer = TableScorer::default()
        .with_score("alpha beta gamma", 0.8)
        .with_score("alpha alpha alpha", 0.6);
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(ConstantEmbedder::default()))
        .with_vector_store(Arc::new(letters_store()))
        .with_passage_scorer(Arc::new(scorer))
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();

    let config = RetrievalConfig::new()
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_reranking(true)
        .with_diversity(0.4);

    let first = engine.retrieve("alpha", "letters", &config).await.unwrap();
    let second = engine.retrieve("alpha", "letters", &config).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_reranker_reorders_fused_head() {
    let scorer = Arc::new(TableScorer::default().with_score("delta epsilon zeta", 5.0));
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(ConstantEmbedder::default()))
        .with_vector_store(Arc::new(letters_store()))
        .with_passage_scorer(scorer.clone())
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();

    let config = RetrievalConfig::new()
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_reranking(true);
    let results = engine.retrieve("alpha", "letters", &config).await.unwrap();

    assert_eq!(results[0].id, "D");
    assert_eq!(results[0].feature(features::CROSS_ENCODER_SCORE), Some(5.0));
    assert!(results[0].feature(features::ORIGINAL_SCORE).is_some());
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reranker_failure_keeps_fused_order() {
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(ConstantEmbedder::default()))
        .with_vector_store(Arc::new(letters_store()))
        .with_passage_scorer(Arc::new(FailingScorer))
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();

    let base = RetrievalConfig::new().with_strategy(RetrievalStrategy::Hybrid);
    let plain = engine.retrieve("alpha", "letters", &base).await.unwrap();

    let response = engine
        .retrieve_detailed("alpha", "letters", &base.with_reranking(true))
        .await
        .unwrap();

    assert_eq!(response.results, plain);
    assert!(matches!(
        response.warnings.as_slice(),
        [RetrievalWarning::Rerank(_)]
    ));
}

#[tokio::test]
async fn test_diversity_pushes_near_duplicate_down() {
    let mut chunks = vec![
        ChunkRecord::new("R1", "rust async runtime tokio", "rust"),
        ChunkRecord::new("R2", "rust async runtime tokio guide", "rust"),
        ChunkRecord::new("R3", "rust borrow checker rules and lifetimes explained", "rust"),
    ];
    for i in 0..4 {
        chunks.push(ChunkRecord::new(
            format!("F{i}"),
            "unrelated filler text here",
            "rust",
        ));
    }
    let engine = RetrievalOrchestrator::builder().build().unwrap();
    engine.build_index("rust", chunks).await.unwrap();

    let config = RetrievalConfig::new().with_strategy(RetrievalStrategy::Lexical);
    let plain = engine.retrieve("rust", "rust", &config).await.unwrap();
    assert_eq!(ids(&plain), vec!["R1", "R2", "R3"]);

    // R2 repeats most of R1 (Jaccard 0.8) while R3 shares one word, which
    // outweighs the small BM25 gap between them.
    let diverse = engine
        .retrieve("rust", "rust", &config.with_diversity(0.7))
        .await
        .unwrap();
    assert_eq!(ids(&diverse), vec!["R1", "R3", "R2"]);
}

#[tokio::test]
async fn test_max_results_truncates() {
    let engine = hybrid_engine().await;
    let config = RetrievalConfig::new()
        .with_strategy(RetrievalStrategy::Hybrid)
        .with_max_results(2);
    let results = engine.retrieve("alpha", "letters", &config).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let engine = hybrid_engine().await;

    let err = engine
        .retrieve(
            "alpha",
            "letters",
            &RetrievalConfig::new().with_weights(0.0, 0.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Configuration(ConfigurationError::ZeroWeights)
    ));

    let err = engine
        .retrieve("alpha", "letters", &RetrievalConfig::new().with_diversity(2.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Configuration(ConfigurationError::DiversityLambdaOutOfRange(_))
    ));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let engine = hybrid_engine().await;
    let token = CancellationToken::new();
    token.cancel();

    let response = engine
        .retrieve_with_cancel(
            "alpha",
            "letters",
            &RetrievalConfig::new().with_strategy(RetrievalStrategy::Hybrid),
            token,
        )
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert!(matches!(
        response.warnings.as_slice(),
        [RetrievalWarning::Cancelled]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_in_flight_branches() {
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(ConstantEmbedder::slow(Duration::from_secs(30))))
        .with_vector_store(Arc::new(letters_store()))
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let response = engine
        .retrieve_with_cancel(
            "alpha",
            "letters",
            &RetrievalConfig::new().with_strategy(RetrievalStrategy::Hybrid),
            token,
        )
        .await
        .unwrap();

    // The lexical branch finished, but its results are not fused on their own.
    assert!(response.results.is_empty());
    assert!(matches!(
        response.warnings.as_slice(),
        [RetrievalWarning::Cancelled]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let engine = RetrievalOrchestrator::builder()
        .with_config(EngineConfig {
            request_timeout_ms: Some(100),
            ..EngineConfig::default()
        })
        .with_embedding_provider(Arc::new(ConstantEmbedder::slow(Duration::from_secs(30))))
        .with_vector_store(Arc::new(letters_store()))
        .build()
        .unwrap();
    engine.build_index("letters", letters()).await.unwrap();

    let response = engine
        .retrieve_detailed(
            "alpha",
            "letters",
            &RetrievalConfig::new().with_strategy(RetrievalStrategy::Hybrid),
        )
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert!(matches!(
        response.warnings.as_slice(),
        [RetrievalWarning::Timeout(100)]
    ));
}

#[tokio::test]
async fn test_reindex_swaps_whole_collection() {
    let engine = RetrievalOrchestrator::builder().build().unwrap();
    engine.build_index("pets", pets()).await.unwrap();

    let config = RetrievalConfig::new().with_strategy(RetrievalStrategy::Lexical);
    assert_eq!(
        ids(&engine.retrieve("cat", "pets", &config).await.unwrap()),
        vec!["1"]
    );

    engine
        .build_index(
            "pets",
            vec![
                ChunkRecord::new("9", "a cat napped", "d9"),
                ChunkRecord::new("10", "a parrot talked", "d10"),
                ChunkRecord::new("11", "a fish swam", "d11"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(
        ids(&engine.retrieve("cat", "pets", &config).await.unwrap()),
        vec!["9"]
    );
}

#[tokio::test]
async fn test_health_report() {
    let engine = RetrievalOrchestrator::builder()
        .with_embedding_provider(Arc::new(FailingEmbedder::default()))
        .with_vector_store(Arc::new(FixedVectorStore::default()))
        .with_passage_scorer(Arc::new(FailingScorer))
        .build()
        .unwrap();
    engine.build_index("pets", pets()).await.unwrap();

    let report = engine.health_check().await;

    assert_eq!(report.index_count, 1);
    assert!(matches!(report.embedding, CapabilityStatus::Unavailable(_)));
    assert_eq!(report.vector_store, CapabilityStatus::Available);
    assert!(matches!(report.reranker, CapabilityStatus::Unavailable(_)));
    assert!(!report.is_healthy());
}
