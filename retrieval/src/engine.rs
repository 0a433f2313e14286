//! Retrieval orchestrator: the engine's public entry point.
//!
//! Per request the orchestrator runs
//! `ANALYZING -> RETRIEVING -> FUSING -> THRESHOLDING -> RERANKING -> DIVERSIFYING -> DONE`.
//! Fusion only happens for hybrid requests; reranking and diversification
//! only when the request enables them. There is no retry loop: collaborator
//! failures become [`RetrievalWarning`]s and the stage degrades.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use sieve_providers::embedding::UNKNOWN_LANGUAGE;
use sieve_providers::{EmbeddingProvider, PassageScorer, SearchFilters, VectorStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{QueryAnalysis, QueryAnalyzer};
use crate::config::{EngineConfig, RetrievalConfig};
use crate::diversity::DiversitySelector;
use crate::error::{Result, RetrievalWarning};
use crate::fusion::HybridFuser;
use crate::index::{IndexRegistry, IndexStats, LexicalIndex};
use crate::lexical::LexicalRetriever;
use crate::rerank::Reranker;
use crate::result::{ChunkRecord, RetrievalResult, RetrievalStrategy};
use crate::semantic::SemanticRetriever;
use crate::strategy::{BranchOutcome, BranchRequest, Retriever};

/// Wall-clock time spent in each stage, in milliseconds. Skipped stages
/// report zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub analysis_ms: f64,
    pub retrieval_ms: f64,
    pub fusion_ms: f64,
    pub rerank_ms: f64,
    pub diversity_ms: f64,
    pub total_ms: f64,
}

/// The ranked results of one request together with how they were produced.
#[derive(Debug, Serialize)]
pub struct RetrievalResponse {
    pub results: Vec<RetrievalResult>,

    pub analysis: QueryAnalysis,

    /// Strategy actually executed.
    pub strategy: RetrievalStrategy,

    /// Degradations absorbed while serving the request.
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<RetrievalWarning>,

    pub stage_timings: StageTimings,
}

fn serialize_warnings<S: Serializer>(
    warnings: &[RetrievalWarning],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}

/// Availability of one collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CapabilityStatus {
    Available,
    Unavailable(String),
    NotConfigured,
}

impl CapabilityStatus {
    fn from_check<E: std::fmt::Display>(check: std::result::Result<(), E>) -> Self {
        match check {
            Ok(()) => Self::Available,
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }
}

/// Per-component availability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub index_count: usize,
    pub indexed_collections: Vec<String>,
    pub embedding: CapabilityStatus,
    pub vector_store: CapabilityStatus,
    pub reranker: CapabilityStatus,
}

impl HealthReport {
    /// True when no configured collaborator is unreachable.
    pub fn is_healthy(&self) -> bool {
        ![&self.embedding, &self.vector_store, &self.reranker]
            .iter()
            .any(|status| matches!(status, CapabilityStatus::Unavailable(_)))
    }
}

/// Drop results scoring below `threshold`.
pub fn apply_threshold(results: Vec<RetrievalResult>, threshold: f64) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|r| r.score >= threshold)
        .collect()
}

struct PipelineOutput {
    results: Vec<RetrievalResult>,
    warnings: Vec<RetrievalWarning>,
    timings: StageTimings,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Multi-strategy retrieval engine.
///
/// Cheap to share behind an `Arc`: requests only read the index registry,
/// and index rebuilds swap whole indexes in.
pub struct RetrievalOrchestrator {
    config: EngineConfig,
    analyzer: QueryAnalyzer,
    registry: Arc<IndexRegistry>,
    lexical: LexicalRetriever,
    semantic: Option<SemanticRetriever>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    reranker: Option<Reranker>,
    fuser: HybridFuser,
    diversity: DiversitySelector,
}

impl RetrievalOrchestrator {
    /// Create a builder.
    pub fn builder() -> RetrievalOrchestratorBuilder {
        RetrievalOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze a query without retrieving.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        self.analyzer.analyze(query)
    }

    /// Build a lexical index for a collection and swap it in, replacing any
    /// previous index.
    pub async fn build_index(
        &self,
        collection_id: &str,
        documents: Vec<ChunkRecord>,
    ) -> Result<IndexStats> {
        let index = LexicalIndex::build(collection_id, documents)?;
        let stats = index.stats();
        if self.registry.install(index).await.is_some() {
            info!("Replaced lexical index for collection {collection_id}");
        }
        Ok(stats)
    }

    /// Remove a collection's lexical index. Returns whether one existed.
    pub async fn drop_index(&self, collection_id: &str) -> bool {
        let removed = self.registry.remove(collection_id).await.is_some();
        if removed {
            info!("Dropped lexical index for collection {collection_id}");
        }
        removed
    }

    pub async fn index_stats(&self, collection_id: &str) -> Option<IndexStats> {
        self.registry.get(collection_id).await.map(|index| index.stats())
    }

    /// Ranked results for `query` in `collection_id`.
    ///
    /// Fails only on an invalid `config`. Collaborator failures degrade the
    /// ranking; an empty list means nothing matched.
    pub async fn retrieve(
        &self,
        query: &str,
        collection_id: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(self
            .retrieve_detailed(query, collection_id, config)
            .await?
            .results)
    }

    /// Like [`Self::retrieve`], with the analysis, warnings, and timings.
    pub async fn retrieve_detailed(
        &self,
        query: &str,
        collection_id: &str,
        config: &RetrievalConfig,
    ) -> Result<RetrievalResponse> {
        self.retrieve_with_cancel(query, collection_id, config, CancellationToken::new())
            .await
    }

    /// Like [`Self::retrieve_detailed`], abandoning in-flight work when
    /// `cancel` fires or the engine's request timeout elapses. Abandoned
    /// requests return no results and a warning; partial branch results are
    /// discarded.
    pub async fn retrieve_with_cancel(
        &self,
        query: &str,
        collection_id: &str,
        config: &RetrievalConfig,
        cancel: CancellationToken,
    ) -> Result<RetrievalResponse> {
        config.validate()?;
        let started = Instant::now();

        debug!("ANALYZING query for collection {collection_id}");
        let analysis = self.analyzer.analyze(query);
        let analysis_ms = elapsed_ms(started);
        let strategy = config.strategy.unwrap_or(analysis.recommended_strategy);

        let run = self.run_pipeline(query, collection_id, config, &analysis, strategy);
        let timeout_ms = self.config.request_timeout_ms;
        let deadline = async move {
            match timeout_ms {
                Some(ms) => tokio::time::timeout(Duration::from_millis(ms), run)
                    .await
                    .map_err(|_| RetrievalWarning::Timeout(ms)),
                None => Ok(run.await),
            }
        };
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RetrievalWarning::Cancelled),
            outcome = deadline => outcome,
        };

        let (results, warnings, mut stage_timings) = match outcome {
            Ok(output) => (output.results, output.warnings, output.timings),
            Err(reason) => {
                warn!("Retrieval for collection {collection_id} abandoned: {reason}");
                (Vec::new(), vec![reason], StageTimings::default())
            }
        };
        stage_timings.analysis_ms = analysis_ms;
        stage_timings.total_ms = elapsed_ms(started);

        debug!(
            "DONE: {} results via {strategy} in {:.1}ms ({} warnings)",
            results.len(),
            stage_timings.total_ms,
            warnings.len()
        );

        Ok(RetrievalResponse {
            results,
            analysis,
            strategy,
            warnings,
            stage_timings,
        })
    }

    /// Report per-component availability. Collaborator probes run
    /// concurrently.
    pub async fn health_check(&self) -> HealthReport {
        let (embedding, vector_store, reranker) = tokio::join!(
            async {
                match &self.embedder {
                    Some(embedder) => CapabilityStatus::from_check(embedder.health_check().await),
                    None => CapabilityStatus::NotConfigured,
                }
            },
            async {
                match &self.vector_store {
                    Some(store) => CapabilityStatus::from_check(store.health_check().await),
                    None => CapabilityStatus::NotConfigured,
                }
            },
            async {
                match &self.reranker {
                    Some(reranker) => {
                        CapabilityStatus::from_check(reranker.scorer().health_check().await)
                    }
                    None => CapabilityStatus::NotConfigured,
                }
            },
        );

        let indexed_collections = self.registry.collections().await;
        HealthReport {
            index_count: indexed_collections.len(),
            indexed_collections,
            embedding,
            vector_store,
            reranker,
        }
    }

    async fn run_pipeline(
        &self,
        query: &str,
        collection_id: &str,
        config: &RetrievalConfig,
        analysis: &QueryAnalysis,
        strategy: RetrievalStrategy,
    ) -> PipelineOutput {
        let mut warnings = Vec::new();
        let mut timings = StageTimings::default();

        let fetch = config
            .max_results
            .saturating_mul(self.config.oversample_factor);
        let language = Some(analysis.language.as_str()).filter(|l| *l != UNKNOWN_LANGUAGE);
        let request = BranchRequest {
            query,
            collection_id,
            limit: fetch,
            language,
        };

        debug!("RETRIEVING via {strategy}, {fetch} candidates per branch");
        let stage = Instant::now();
        let mut results = match strategy {
            RetrievalStrategy::Lexical => {
                let outcome = self.lexical.retrieve(request).await;
                timings.retrieval_ms = elapsed_ms(stage);
                absorb(outcome, &mut warnings)
            }
            RetrievalStrategy::Semantic => {
                let outcome = self.semantic_branch(request).await;
                timings.retrieval_ms = elapsed_ms(stage);
                absorb(outcome, &mut warnings)
            }
            RetrievalStrategy::Hybrid => {
                let (lexical, semantic) =
                    tokio::join!(self.lexical.retrieve(request), self.semantic_branch(request));
                timings.retrieval_ms = elapsed_ms(stage);
                let lexical = absorb(lexical, &mut warnings);
                let semantic = absorb(semantic, &mut warnings);

                debug!(
                    "FUSING {} lexical and {} semantic candidates",
                    lexical.len(),
                    semantic.len()
                );
                let stage = Instant::now();
                let fused = self.fuser.fuse(
                    &lexical,
                    &semantic,
                    config.semantic_weight,
                    config.lexical_weight,
                    fetch,
                );
                timings.fusion_ms = elapsed_ms(stage);
                fused
            }
        };

        debug!(
            "THRESHOLDING {} candidates at {}",
            results.len(),
            config.min_score_threshold
        );
        results = apply_threshold(results, config.min_score_threshold);

        if config.enable_reranking && !results.is_empty() {
            match &self.reranker {
                Some(reranker) => {
                    debug!("RERANKING {} candidates", results.len());
                    let stage = Instant::now();
                    let top_k = config
                        .max_results
                        .saturating_mul(self.config.rerank.candidate_multiplier);
                    let (reranked, warning) = reranker.rerank(query, results, top_k).await;
                    results = reranked;
                    warnings.extend(warning);
                    timings.rerank_ms = elapsed_ms(stage);
                }
                None => {
                    let warning = RetrievalWarning::NotConfigured {
                        capability: "reranker",
                    };
                    warn!("Skipping rerank: {warning}");
                    warnings.push(warning);
                }
            }
        }

        if config.diversity_lambda > 0.0 {
            debug!(
                "DIVERSIFYING {} candidates with lambda {}",
                results.len(),
                config.diversity_lambda
            );
            let stage = Instant::now();
            results = self.diversity.diversify(results, config.diversity_lambda);
            timings.diversity_ms = elapsed_ms(stage);
        }

        results.truncate(config.max_results);
        PipelineOutput {
            results,
            warnings,
            timings,
        }
    }

    async fn semantic_branch(&self, request: BranchRequest<'_>) -> BranchOutcome {
        match &self.semantic {
            Some(semantic) => semantic.retrieve(request).await,
            None => Err(RetrievalWarning::NotConfigured {
                capability: "semantic retrieval",
            }),
        }
    }
}

/// Collapse a failed branch to an empty list, keeping the warning.
fn absorb(outcome: BranchOutcome, warnings: &mut Vec<RetrievalWarning>) -> Vec<RetrievalResult> {
    match outcome {
        Ok(results) => results,
        Err(warning) => {
            warn!("Retrieval branch degraded to empty: {warning}");
            warnings.push(warning);
            Vec::new()
        }
    }
}

/// Builder for [`RetrievalOrchestrator`].
pub struct RetrievalOrchestratorBuilder {
    config: EngineConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    scorer: Option<Arc<dyn PassageScorer>>,
    filters: SearchFilters,
    registry: Option<Arc<IndexRegistry>>,
}

impl RetrievalOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            embedder: None,
            vector_store: None,
            scorer: None,
            filters: SearchFilters::default(),
            registry: None,
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the embedding provider used by the semantic branch.
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Set the vector store searched by the semantic branch.
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the pairwise scorer used for reranking.
    pub fn with_passage_scorer(mut self, scorer: Arc<dyn PassageScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Filters applied to every vector search.
    pub fn with_search_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Share an existing index registry.
    pub fn with_index_registry(mut self, registry: Arc<IndexRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<RetrievalOrchestrator> {
        self.config.validate()?;

        let registry = self.registry.unwrap_or_default();
        let semantic = match (&self.embedder, &self.vector_store) {
            (Some(embedder), Some(store)) => Some(
                SemanticRetriever::new(Arc::clone(embedder), Arc::clone(store))
                    .with_filters(self.filters),
            ),
            _ => None,
        };
        let reranker = self
            .scorer
            .map(|scorer| Reranker::new(scorer).with_batch_size(self.config.rerank.batch_size));

        info!(
            "Retrieval engine ready (semantic: {}, reranker: {})",
            semantic.is_some(),
            reranker.is_some()
        );

        Ok(RetrievalOrchestrator {
            analyzer: QueryAnalyzer::new(self.config.analyzer.clone()),
            lexical: LexicalRetriever::new(Arc::clone(&registry), self.config.bm25),
            fuser: HybridFuser::from_config(&self.config.fusion),
            diversity: DiversitySelector::new(),
            registry,
            semantic,
            embedder: self.embedder,
            vector_store: self.vector_store,
            reranker,
            config: self.config,
        })
    }
}

impl Default for RetrievalOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
