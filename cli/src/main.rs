//! Sieve CLI
//!
//! Indexes a JSONL chunk file in memory and queries it.
//!
//! ## Usage
//!
//! ```bash
//! # Show how a query is analyzed and routed
//! sieve analyze "what is reciprocal rank fusion?"
//!
//! # Query a chunk file
//! sieve query --chunks chunks.jsonl --collection docs "rank fusion"
//!
//! # Hybrid retrieval with an HTTP reranker and diversification
//! sieve query --chunks chunks.jsonl --strategy hybrid \
//!     --rerank --rerank-url http://localhost:8080 --diversity 0.3 "bm25 saturation"
//!
//! # Collaborator availability
//! sieve health --chunks chunks.jsonl
//! ```
//!
//! Each line of the chunk file is a JSON object with `id`, `content`,
//! `document_id`, and optional `chunk_index` and `metadata`. When
//! `OPENAI_API_KEY` is set the chunks are embedded into an in-memory vector
//! store so the semantic branch is available.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sieve_providers::{
    EmbeddingProvider, EmbeddingRequest, HttpRerankProvider, InMemoryVectorStore,
    OpenAIProvider, VectorRecord,
};
use sieve_retrieval::{
    CancellationToken, ChunkRecord, EngineConfig, RetrievalConfig, RetrievalOrchestrator,
    RetrievalStrategy,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Multi-strategy retrieval over chunked documents
#[derive(Parser)]
#[command(name = "sieve")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging for the engine
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a query would be analyzed and routed
    Analyze {
        query: String,

        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Index a chunk file and run one query against it
    Query {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Force a strategy instead of the analyzer's recommendation
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        max_results: usize,

        /// Rerank fused candidates (needs --rerank-url)
        #[arg(long)]
        rerank: bool,

        /// Novelty weight for MMR in [0, 1]; 0 disables diversification
        #[arg(long, default_value_t = 0.0)]
        diversity: f64,

        /// Drop results scoring below this value
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,

        /// RRF weight of the semantic ranking
        #[arg(long, default_value_t = 1.0)]
        semantic_weight: f64,

        /// RRF weight of the lexical ranking
        #[arg(long, default_value_t = 1.0)]
        lexical_weight: f64,

        query: String,
    },

    /// Report collaborator availability
    Health {
        #[command(flatten)]
        corpus: CorpusArgs,
    },
}

#[derive(Args)]
struct CorpusArgs {
    /// JSONL file of chunks
    #[arg(long)]
    chunks: PathBuf,

    /// Collection id the chunks are indexed under
    #[arg(long, default_value = "default")]
    collection: String,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of an HTTP rerank service
    #[arg(long, env = "SIEVE_RERANK_URL")]
    rerank_url: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Lexical,
    Semantic,
    Hybrid,
}

impl From<StrategyArg> for RetrievalStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Lexical => Self::Lexical,
            StrategyArg::Semantic => Self::Semantic,
            StrategyArg::Hybrid => Self::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze { query, config } => {
            let engine = RetrievalOrchestrator::builder()
                .with_config(load_config(config.as_deref())?)
                .build()?;
            print_json(&engine.analyze(&query))
        }
        Command::Query {
            corpus,
            strategy,
            max_results,
            rerank,
            diversity,
            min_score,
            semantic_weight,
            lexical_weight,
            query,
        } => {
            let engine = open_engine(&corpus, embedder_from_env()).await?;

            let mut config = RetrievalConfig::new()
                .with_max_results(max_results)
                .with_weights(semantic_weight, lexical_weight)
                .with_reranking(rerank)
                .with_diversity(diversity)
                .with_min_score(min_score);
            if let Some(strategy) = strategy {
                config = config.with_strategy(strategy.into());
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let response = engine
                .retrieve_with_cancel(&query, &corpus.collection, &config, cancel)
                .await?;
            for warning in &response.warnings {
                warn!("{warning}");
            }
            print_json(&response)
        }
        Command::Health { corpus } => {
            let engine = open_engine(&corpus, embedder_from_env()).await?;
            let report = engine.health_check().await;
            print_json(&report)?;
            if !report.is_healthy() {
                bail!("one or more collaborators are unavailable");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "info,sieve_retrieval=debug,sieve_providers=debug,sieve=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Parse one chunk per non-blank line.
fn parse_chunks(text: &str) -> Result<Vec<ChunkRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid chunk on line {}", number + 1))
        })
        .collect()
}

fn load_chunks(path: &Path) -> Result<Vec<ChunkRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_chunks(&text)
}

/// The OpenAI embedder when `OPENAI_API_KEY` is set.
fn embedder_from_env() -> Option<OpenAIProvider> {
    let embedder = OpenAIProvider::new();
    if embedder.is_available() {
        Some(embedder)
    } else {
        info!("OPENAI_API_KEY not set; semantic retrieval disabled");
        None
    }
}

/// Build an engine over the chunk file. Semantic retrieval is wired only
/// when `embedder` is given and embedding the chunks succeeds.
async fn open_engine(
    corpus: &CorpusArgs,
    embedder: Option<OpenAIProvider>,
) -> Result<RetrievalOrchestrator> {
    let config = load_config(corpus.config.as_deref())?;
    let chunks = load_chunks(&corpus.chunks)?;
    let mut builder = RetrievalOrchestrator::builder().with_config(config);

    if let Some(embedder) = embedder {
        let store = InMemoryVectorStore::new();
        match embed_chunks(&embedder, &store, &corpus.collection, &chunks).await {
            Ok(count) => {
                info!("Embedded {count} chunks");
                builder = builder
                    .with_embedding_provider(Arc::new(embedder))
                    .with_vector_store(Arc::new(store));
            }
            Err(e) => warn!("Semantic retrieval disabled: {e:#}"),
        }
    }

    if let Some(url) = &corpus.rerank_url {
        let mut scorer = HttpRerankProvider::new(url);
        if let Ok(key) = std::env::var("SIEVE_RERANK_API_KEY") {
            scorer = scorer.with_api_key(key);
        }
        builder = builder.with_passage_scorer(Arc::new(scorer));
    }

    let engine = builder.build()?;
    let stats = engine.build_index(&corpus.collection, chunks).await?;
    info!(
        "Indexed {} chunks into {} ({} terms)",
        stats.document_count, corpus.collection, stats.vocabulary_size
    );
    Ok(engine)
}

async fn embed_chunks(
    embedder: &OpenAIProvider,
    store: &InMemoryVectorStore,
    collection_id: &str,
    chunks: &[ChunkRecord],
) -> Result<usize> {
    let requests = chunks
        .iter()
        .map(|chunk| EmbeddingRequest::new(chunk.content.as_str()))
        .collect();
    let responses = embedder
        .embed_batch(requests)
        .await
        .context("embedding chunks")?;
    if responses.len() != chunks.len() {
        bail!(
            "embedding provider returned {} vectors for {} chunks",
            responses.len(),
            chunks.len()
        );
    }

    let records = chunks
        .iter()
        .zip(responses)
        .map(|(chunk, response)| VectorRecord {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            document_id: chunk.document_id.clone(),
            chunk_index: chunk.chunk_index,
            metadata: chunk.metadata.clone(),
            embedding: response.embedding,
        })
        .collect();
    Ok(store.upsert(collection_id, records).await?)
}
