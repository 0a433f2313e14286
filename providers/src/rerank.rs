//! Pairwise (query, passage) relevance scoring.
//!
//! A [`PassageScorer`] returns one relevance score per passage, aligned with
//! the input order. [`HttpRerankProvider`] talks to services exposing the
//! common `/rerank` JSON shape (`{model, query, documents}` in,
//! `{results: [{index, relevance_score}]}` out).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::RerankError;

/// Trait for cross-encoder style relevance models.
#[async_trait]
pub trait PassageScorer: Send + Sync {
    /// Get the name of this scorer.
    fn name(&self) -> &str;

    /// Score every passage against the query. The output is aligned 1:1
    /// with `passages`.
    async fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError>;

    /// Check that the scorer can be reached.
    async fn health_check(&self) -> Result<(), RerankError> {
        Ok(())
    }
}

/// HTTP reranking provider.
pub struct HttpRerankProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpRerankProvider {
    /// Create a provider for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            model: "rerank-english-v3.0".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl PassageScorer for HttpRerankProvider {
    fn name(&self) -> &str {
        "http-rerank"
    }

    async fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Scoring {} passages with model: {}",
            passages.len(),
            self.model
        );

        let body = serde_json::json!({
            "model": self.model,
            "query": query,
            "documents": passages,
            "top_n": passages.len(),
        });

        let mut request = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RerankError::ApiRequest(format!("{status}: {error_text}")));
        }

        let parsed: RerankResponse = response.json().await?;
        align_scores(parsed.results, passages.len())
    }
}

/// Place each scored result at its input index. Every index must be covered
/// exactly once.
fn align_scores(results: Vec<RerankResult>, expected: usize) -> Result<Vec<f32>, RerankError> {
    if results.len() != expected {
        return Err(RerankError::LengthMismatch {
            expected,
            actual: results.len(),
        });
    }

    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for result in results {
        let slot = scores.get_mut(result.index).ok_or_else(|| {
            RerankError::InvalidResponse(format!("index {} out of range", result.index))
        })?;
        if slot.replace(result.relevance_score).is_some() {
            return Err(RerankError::InvalidResponse(format!(
                "duplicate index {}",
                result.index
            )));
        }
    }

    // Lengths match and no index repeats, so every slot is filled.
    Ok(scores.into_iter().flatten().collect())
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}
