//! Configuration for the retrieval engine.
//!
//! [`RetrievalConfig`] travels with each request. [`EngineConfig`] is fixed
//! per engine instance and can be loaded from TOML; every section defaults,
//! so a file only needs to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::fusion::DEFAULT_RRF_K;
use crate::lexical::Bm25Params;
use crate::rerank::DEFAULT_BATCH_SIZE;
use crate::result::RetrievalStrategy;

/// Per-request configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Forced strategy. `None` uses the analyzer's recommendation.
    pub strategy: Option<RetrievalStrategy>,

    /// Maximum number of results returned.
    pub max_results: usize,

    /// Fusion weight of the semantic list.
    pub semantic_weight: f64,

    /// Fusion weight of the lexical list.
    pub lexical_weight: f64,

    /// Rescore the fused head with the passage scorer.
    pub enable_reranking: bool,

    /// Novelty weight for MMR, in [0, 1]. Zero skips diversification.
    pub diversity_lambda: f64,

    /// Results scoring below this after fusion are dropped.
    pub min_score_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            max_results: 10,
            semantic_weight: 1.0,
            lexical_weight: 1.0,
            enable_reranking: false,
            diversity_lambda: 0.0,
            min_score_threshold: 0.0,
        }
    }
}

impl RetrievalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a strategy instead of the analyzer's recommendation.
    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set both fusion weights.
    pub fn with_weights(mut self, semantic_weight: f64, lexical_weight: f64) -> Self {
        self.semantic_weight = semantic_weight;
        self.lexical_weight = lexical_weight;
        self
    }

    pub fn with_reranking(mut self, enabled: bool) -> Self {
        self.enable_reranking = enabled;
        self
    }

    pub fn with_diversity(mut self, lambda: f64) -> Self {
        self.diversity_lambda = lambda;
        self
    }

    pub fn with_min_score(mut self, threshold: f64) -> Self {
        self.min_score_threshold = threshold;
        self
    }

    /// Reject configurations that cannot produce a meaningful ranking.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        for (field, value) in [
            ("semantic_weight", self.semantic_weight),
            ("lexical_weight", self.lexical_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidWeight { field, value });
            }
        }
        if self.semantic_weight == 0.0 && self.lexical_weight == 0.0 {
            return Err(ConfigurationError::ZeroWeights);
        }
        if !(0.0..=1.0).contains(&self.diversity_lambda) {
            return Err(ConfigurationError::DiversityLambdaOutOfRange(
                self.diversity_lambda,
            ));
        }
        if self.max_results == 0 {
            return Err(ConfigurationError::ZeroMaxResults);
        }
        if !self.min_score_threshold.is_finite() {
            return Err(ConfigurationError::NonFiniteThreshold(
                self.min_score_threshold,
            ));
        }
        Ok(())
    }
}

const INTERROGATIVE_MARKERS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "whom", "whose", "which", "whether",
];

const ANALYTICAL_MARKERS: &[&str] = &[
    "compare",
    "comparison",
    "contrast",
    "difference",
    "differences",
    "explain",
    "analyze",
    "analyse",
    "analysis",
    "evaluate",
    "versus",
    "vs",
    "relationship",
    "impact",
    "tradeoff",
    "tradeoffs",
    "pros",
    "cons",
    "implications",
];

/// Query analysis tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Weight of the token-count ratio in the complexity estimate.
    pub length_weight: f64,

    /// Weight of the interrogative-marker fraction.
    pub interrogative_weight: f64,

    /// Weight of the analytical-marker fraction.
    pub analytical_weight: f64,

    /// Token count at which the length ratio saturates.
    pub max_tokens: usize,

    /// Simple lookups below this complexity prefer lexical retrieval.
    pub lexical_threshold: f64,

    /// Queries above this complexity always use hybrid retrieval.
    pub hybrid_threshold: f64,

    pub interrogative_markers: Vec<String>,

    pub analytical_markers: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            length_weight: 0.4,
            interrogative_weight: 0.3,
            analytical_weight: 0.3,
            max_tokens: 20,
            lexical_threshold: 0.3,
            hybrid_threshold: 0.7,
            interrogative_markers: INTERROGATIVE_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            analytical_markers: ANALYTICAL_MARKERS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let weights = [
            self.length_weight,
            self.interrogative_weight,
            self.analytical_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigurationError::AnalyzerWeights);
        }
        if self.max_tokens == 0 {
            return Err(ConfigurationError::ZeroTokenCap);
        }
        let ordered = 0.0 <= self.lexical_threshold
            && self.lexical_threshold <= self.hybrid_threshold
            && self.hybrid_threshold <= 1.0;
        if !ordered {
            return Err(ConfigurationError::AnalyzerThresholds {
                lexical: self.lexical_threshold,
                hybrid: self.hybrid_threshold,
            });
        }
        Ok(())
    }
}

/// Rank fusion tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// RRF damping constant.
    pub rrf_k: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// Reranking tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Passages per scoring call.
    pub batch_size: usize,

    /// The reranked head is `max_results * candidate_multiplier` long.
    pub candidate_multiplier: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            candidate_multiplier: 2,
        }
    }
}

/// Per-engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,

    pub bm25: Bm25Params,

    pub fusion: FusionConfig,

    pub rerank: RerankConfig,

    /// Each branch is asked for `max_results * oversample_factor` results.
    pub oversample_factor: usize,

    /// Whole-request deadline in milliseconds.
    pub request_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            bm25: Bm25Params::default(),
            fusion: FusionConfig::default(),
            rerank: RerankConfig::default(),
            oversample_factor: 2,
            request_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.analyzer.validate()?;
        self.bm25.validate()?;
        if self.fusion.rrf_k == 0 {
            return Err(ConfigurationError::ZeroRrfK);
        }
        if self.rerank.batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize);
        }
        if self.oversample_factor == 0 || self.rerank.candidate_multiplier == 0 {
            return Err(ConfigurationError::ZeroOversample);
        }
        Ok(())
    }
}
