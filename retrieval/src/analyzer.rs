//! Query analysis: language, complexity, intent, entities, and the
//! recommended retrieval strategy.
//!
//! Analysis is heuristic and never fails. Queries with nothing to analyze
//! (empty or punctuation only) get a conservative default that routes to
//! hybrid retrieval.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sieve_providers::embedding::UNKNOWN_LANGUAGE;
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::result::RetrievalStrategy;
use crate::tokenizer::{is_stop_word, keywords, tokenize};

/// Complexity assigned when analysis cannot say anything better.
pub const DEFAULT_COMPLEXITY: f64 = 0.5;

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// A short, specific term or name.
    Lookup,
    /// "What is X", "define X".
    Definition,
    /// Two or more things weighed against each other.
    Comparison,
    /// Reasons, causes, or mechanisms.
    Explanation,
    /// Steps to accomplish something.
    Procedural,
    /// Anything else.
    Search,
}

impl QueryIntent {
    /// Intents answerable by matching a few exact terms.
    pub fn is_simple_lookup(self) -> bool {
        matches!(self, Self::Lookup | Self::Definition)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Definition => "definition",
            Self::Comparison => "comparison",
            Self::Explanation => "explanation",
            Self::Procedural => "procedural",
            Self::Search => "search",
        }
    }
}

/// Read-only snapshot of a query, computed fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub original: String,
    /// Lowercased, whitespace-collapsed.
    pub normalized: String,
    /// ISO 639-1 code, or `"unknown"`.
    pub language: String,
    /// In [0, 1].
    pub complexity: f64,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    pub intent: QueryIntent,
    pub recommended_strategy: RetrievalStrategy,
}

impl QueryAnalysis {
    /// The conservative fallback analysis.
    pub fn fallback(query: &str) -> Self {
        Self {
            original: query.to_string(),
            normalized: normalize(query),
            language: UNKNOWN_LANGUAGE.to_string(),
            complexity: DEFAULT_COMPLEXITY,
            entities: Vec::new(),
            keywords: Vec::new(),
            intent: QueryIntent::Search,
            recommended_strategy: RetrievalStrategy::Hybrid,
        }
    }
}

/// Why detailed analysis was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisFailure {
    NoTokens,
}

/// Heuristic query analyzer.
#[derive(Debug)]
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    interrogative: HashSet<String>,
    analytical: HashSet<String>,
    entity_patterns: Vec<regex_lite::Regex>,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl QueryAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let interrogative = config
            .interrogative_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        let analytical = config
            .analytical_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();

        let mut entity_patterns = Vec::new();
        for pattern in [
            // Quoted phrases
            r#""([^"]+)""#,
            // Capitalized word sequences
            r"\b([A-Z][A-Za-z0-9]*(?:[ \t]+[A-Z][A-Za-z0-9]*)*)",
            // Numbers and versions
            r"\b(\d+(?:\.\d+)*)\b",
        ] {
            if let Ok(re) = regex_lite::Regex::new(pattern) {
                entity_patterns.push(re);
            }
        }

        Self {
            config,
            interrogative,
            analytical,
            entity_patterns,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a query. Never fails.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        match self.try_analyze(query) {
            Ok(analysis) => {
                debug!(
                    "Analyzed query: intent={}, complexity={:.2}, language={}, strategy={}",
                    analysis.intent.as_str(),
                    analysis.complexity,
                    analysis.language,
                    analysis.recommended_strategy
                );
                analysis
            }
            Err(failure) => {
                debug!("Query analysis fell back to defaults: {failure:?}");
                QueryAnalysis::fallback(query)
            }
        }
    }

    fn try_analyze(&self, query: &str) -> Result<QueryAnalysis, AnalysisFailure> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Err(AnalysisFailure::NoTokens);
        }

        let normalized = normalize(query);
        let intent = self.classify_intent(&normalized, &tokens);
        let complexity = self.complexity(&tokens);
        let recommended_strategy = self.recommend(complexity, intent);

        Ok(QueryAnalysis {
            original: query.to_string(),
            language: detect_language(query, &tokens).to_string(),
            complexity,
            entities: self.extract_entities(query),
            keywords: keywords(query),
            intent,
            recommended_strategy,
            normalized,
        })
    }

    /// Weighted average of length, interrogative, and analytical signals.
    pub fn complexity(&self, tokens: &[String]) -> f64 {
        if tokens.is_empty() {
            return DEFAULT_COMPLEXITY;
        }
        let n = tokens.len() as f64;
        let cap = self.config.max_tokens.max(1);
        let length = tokens.len().min(cap) as f64 / cap as f64;
        let interrogative = tokens
            .iter()
            .filter(|t| self.interrogative.contains(t.as_str()))
            .count() as f64
            / n;
        let analytical = tokens
            .iter()
            .filter(|t| self.analytical.contains(t.as_str()))
            .count() as f64
            / n;

        let weights = self.config.length_weight
            + self.config.interrogative_weight
            + self.config.analytical_weight;
        if weights <= 0.0 {
            return DEFAULT_COMPLEXITY;
        }
        let weighted = self.config.length_weight * length
            + self.config.interrogative_weight * interrogative
            + self.config.analytical_weight * analytical;
        (weighted / weights).clamp(0.0, 1.0)
    }

    /// Strategy policy: simple, low-complexity lookups go lexical; anything
    /// above the hybrid threshold, and everything else by default, goes
    /// hybrid.
    pub fn recommend(&self, complexity: f64, intent: QueryIntent) -> RetrievalStrategy {
        let simple = complexity < self.config.lexical_threshold
            && complexity <= self.config.hybrid_threshold
            && intent.is_simple_lookup();
        if simple {
            RetrievalStrategy::Lexical
        } else {
            RetrievalStrategy::Hybrid
        }
    }

    fn classify_intent(&self, normalized: &str, tokens: &[String]) -> QueryIntent {
        let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| normalized.starts_with(p));

        if has(&["compare", "comparison", "versus", "vs", "difference", "differences"])
            || normalized.contains("better than")
        {
            return QueryIntent::Comparison;
        }
        if normalized.contains("how to")
            || starts(&["how do ", "how can ", "how should ", "steps "])
            || has(&["install", "configure", "setup", "tutorial", "steps"])
        {
            return QueryIntent::Procedural;
        }
        if starts(&["what is ", "what are ", "what's ", "define ", "meaning of "])
            || has(&["definition", "meaning"])
        {
            return QueryIntent::Definition;
        }
        if has(&["why", "explain", "explanation", "cause", "causes", "reason"])
            || starts(&["how does ", "how do ", "describe "])
        {
            return QueryIntent::Explanation;
        }

        let marked = tokens.iter().any(|t| {
            self.interrogative.contains(t.as_str()) || self.analytical.contains(t.as_str())
        });
        if !marked && tokens.len() <= 2 {
            return QueryIntent::Lookup;
        }
        if starts(&["find ", "show ", "list ", "lookup ", "look up ", "get "]) {
            return QueryIntent::Lookup;
        }
        QueryIntent::Search
    }

    fn extract_entities(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for re in &self.entity_patterns {
            for cap in re.captures_iter(query) {
                let Some(matched) = cap.get(1) else {
                    continue;
                };
                let entity = strip_leading_stop_words(matched.as_str());
                if entity.is_empty() {
                    continue;
                }
                if seen.insert(entity.to_lowercase()) {
                    entities.push(entity.to_string());
                }
            }
        }

        entities
    }
}

fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop sentence-initial stop words ("What Is Rust" -> "Rust").
fn strip_leading_stop_words(phrase: &str) -> &str {
    let mut rest = phrase.trim();
    loop {
        let (head, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if head.is_empty() || !is_stop_word(&head.to_lowercase()) {
            return rest;
        }
        rest = tail.trim_start();
        if rest.is_empty() {
            return rest;
        }
    }
}

const LATIN_STOP_WORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "is", "and", "of", "what", "how", "to", "in", "a", "are", "why"],
    ),
    (
        "es",
        &["el", "la", "los", "las", "es", "qué", "que", "cómo", "como", "por", "y", "de"],
    ),
    (
        "fr",
        &["le", "la", "les", "est", "et", "qu", "quoi", "comment", "pourquoi", "des", "du"],
    ),
    (
        "de",
        &["der", "die", "das", "ist", "und", "was", "wie", "warum", "nicht", "ein", "eine"],
    ),
    (
        "pt",
        &["o", "os", "as", "é", "e", "não", "como", "porque", "do", "da", "um", "uma"],
    ),
    (
        "it",
        &["il", "lo", "gli", "è", "che", "come", "perché", "non", "di", "un", "una"],
    ),
];

/// Guess the query language from its script, then from stop-word votes for
/// Latin text. English wins ties.
pub fn detect_language(query: &str, tokens: &[String]) -> &'static str {
    let mut letters = 0usize;
    let mut han = 0usize;
    let mut kana = 0usize;
    let mut hangul = 0usize;
    let mut cyrillic = 0usize;
    let mut arabic = 0usize;
    let mut greek = 0usize;
    let mut devanagari = 0usize;

    for c in query.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        match u32::from(c) {
            0x3040..=0x30FF => kana += 1,
            0x4E00..=0x9FFF | 0x3400..=0x4DBF => han += 1,
            0xAC00..=0xD7AF | 0x1100..=0x11FF => hangul += 1,
            0x0400..=0x04FF => cyrillic += 1,
            0x0600..=0x06FF => arabic += 1,
            0x0370..=0x03FF => greek += 1,
            0x0900..=0x097F => devanagari += 1,
            _ => {}
        }
    }

    if letters == 0 {
        return UNKNOWN_LANGUAGE;
    }
    if kana > 0 {
        return "ja";
    }
    let scripts = [
        ("zh", han),
        ("ko", hangul),
        ("ru", cyrillic),
        ("ar", arabic),
        ("el", greek),
        ("hi", devanagari),
    ];
    if let Some((code, _)) = scripts
        .iter()
        .filter(|(_, count)| *count * 2 >= letters)
        .max_by_key(|(_, count)| *count)
    {
        return *code;
    }

    let mut best = ("en", 0usize);
    for (code, words) in LATIN_STOP_WORDS {
        let votes = tokens.iter().filter(|t| words.contains(&t.as_str())).count();
        if votes > best.1 {
            best = (*code, votes);
        }
    }
    best.0
}
