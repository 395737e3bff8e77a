//! Second-stage reranking
//!
//! The relevance model (typically a cross-encoder) is an external scoring
//! function behind [`RelevanceScorer`]. [`Reranker`] runs it on the blocking
//! pool under a timeout and turns every failure into a skipped outcome, so a
//! broken or slow scorer never fails a search.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{HybrankError, Result};
use crate::search::embeddings::fnv1a_hash;
use crate::search::text::tokenize;

/// Pairwise query/document relevance model.
///
/// Called from a blocking thread; implementations may do heavy CPU work.
pub trait RelevanceScorer: Send + Sync {
    /// One score per document, in input order.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "scorer"
    }
}

/// Per-request rollout decision for reranking.
pub trait RerankGate: Send + Sync {
    /// Whether reranking may run for this normalized query text.
    fn allows(&self, normalized_query: &str) -> bool;
}

/// Gate that never vetoes reranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl RerankGate for AlwaysAllow {
    fn allows(&self, _normalized_query: &str) -> bool {
        true
    }
}

/// Deterministic percentage rollout keyed on the query text.
///
/// The same query always lands in the same bucket, so repeated requests
/// (and their cache keys) stay stable.
#[derive(Debug, Clone, Copy)]
pub struct PercentageGate {
    percent: u8,
}

impl PercentageGate {
    /// Values above 100 are treated as 100.
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
        }
    }

    pub const fn percent(&self) -> u8 {
        self.percent
    }

    fn bucket(normalized_query: &str) -> u64 {
        fnv1a_hash(normalized_query.as_bytes()) % 100
    }
}

impl RerankGate for PercentageGate {
    fn allows(&self, normalized_query: &str) -> bool {
        Self::bucket(normalized_query) < u64::from(self.percent)
    }
}

/// Local relevance model: the fraction of distinct query terms that occur
/// in the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapScorer;

impl RelevanceScorer for TermOverlapScorer {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }

        let total = terms.len() as f32;
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_terms: HashSet<String> = tokenize(doc).into_iter().collect();
                let matched = terms.iter().filter(|t| doc_terms.contains(*t)).count();
                matched as f32 / total
            })
            .collect())
    }

    fn name(&self) -> &str {
        "term-overlap"
    }
}

/// Result of one rerank attempt.
#[derive(Debug, Clone)]
pub enum RerankOutcome {
    /// Scores aligned with the input documents.
    Applied { scores: Vec<f32>, elapsed: Duration },
    /// Reranking did not happen; fused scores stand.
    Skipped { reason: HybrankError },
}

impl RerankOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn scores(&self) -> Option<&[f32]> {
        match self {
            Self::Applied { scores, .. } => Some(scores),
            Self::Skipped { .. } => None,
        }
    }
}

/// Runs an optional [`RelevanceScorer`] with a time bound.
#[derive(Clone)]
pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
    timeout: Duration,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("scorer", &self.scorer.as_ref().map(|s| s.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    pub const fn is_available(&self) -> bool {
        self.scorer.is_some()
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Score `documents` against `query`.
    ///
    /// Never returns an error: an absent scorer, a scorer error or panic, a
    /// timeout, a length mismatch or a non-finite score all produce
    /// [`RerankOutcome::Skipped`]. On timeout the blocking call is left to
    /// finish in the background and its result is discarded.
    pub async fn rerank(&self, query: &str, documents: Vec<String>) -> RerankOutcome {
        let Some(scorer) = self.scorer.clone() else {
            return RerankOutcome::Skipped {
                reason: HybrankError::RerankerUnavailable("no relevance scorer configured".into()),
            };
        };
        if documents.is_empty() {
            return RerankOutcome::Applied {
                scores: Vec::new(),
                elapsed: Duration::ZERO,
            };
        }

        let expected = documents.len();
        let query = query.to_string();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || scorer.score(&query, &documents));

        let outcome = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(HybrankError::RerankerTimeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Ok(Err(join_err)) => Err(HybrankError::RerankerUnavailable(format!(
                "scorer task failed: {join_err}"
            ))),
            Ok(Ok(Err(err))) => Err(HybrankError::RerankerUnavailable(err.to_string())),
            Ok(Ok(Ok(scores))) => validate_scores(scores, expected),
        };

        match outcome {
            Ok(scores) => {
                let elapsed = started.elapsed();
                debug!(
                    candidates = expected,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Rerank applied"
                );
                RerankOutcome::Applied { scores, elapsed }
            }
            Err(reason) => {
                warn!(error = %reason, candidates = expected, "Rerank skipped; keeping fused order");
                RerankOutcome::Skipped { reason }
            }
        }
    }
}

fn validate_scores(scores: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if scores.len() != expected {
        return Err(HybrankError::RerankerUnavailable(format!(
            "scorer returned {} scores for {expected} candidates",
            scores.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(HybrankError::RerankerUnavailable(
            "scorer returned a non-finite score".to_string(),
        ));
    }
    Ok(scores)
}
