//! Offline retrieval evaluation
//!
//! An eval set pairs queries with the source URLs a good answer should
//! surface. Every query runs through [`HybridSearchEngine::search`] and a
//! returned chunk counts as relevant when its URL is one of the query's gold
//! URLs. Per-query recall@k, reciprocal rank and nDCG@k are averaged over
//! the set into an [`EvalReport`].
//!
//! The set is JSON Lines (`{"q": "...", "gold_urls": ["..."]}` per line) or
//! a single JSON array of the same objects.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HybrankError, Result};
use crate::search::engine::HybridSearchEngine;
use crate::search::query::{ScoringStrategy, SearchMode, SearchRequest};

/// One labelled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalQuery {
    #[serde(alias = "query")]
    pub q: String,
    pub gold_urls: Vec<String>,
}

/// Labelled queries, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalSet {
    queries: Vec<EvalQuery>,
}

impl EvalSet {
    pub fn new(queries: Vec<EvalQuery>) -> Self {
        Self { queries }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&raw)
    }

    /// Parse JSON Lines, or a JSON array when the input starts with `[`.
    /// Blank lines are skipped.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim_start().starts_with('[') {
            return Ok(Self::new(serde_json::from_str(raw)?));
        }

        let mut queries = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let query = serde_json::from_str(line).map_err(|err| {
                HybrankError::Json(format!("eval set line {}: {err}", index + 1))
            })?;
            queries.push(query);
        }
        Ok(Self::new(queries))
    }

    pub fn queries(&self) -> &[EvalQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Discounted cumulative gain, log2 discount starting at rank 1.
pub fn dcg(rels: &[f64]) -> f64 {
    rels.iter()
        .enumerate()
        .map(|(i, rel)| rel / ((i + 2) as f64).log2())
        .sum()
}

/// nDCG over the first `k` results.
///
/// The ideal ordering is the retrieved relevances sorted descending, so a
/// list with no relevant result scores 0.0 rather than dividing by zero.
pub fn ndcg_at_k(rels: &[f64], k: usize) -> f64 {
    let top = &rels[..rels.len().min(k)];
    let mut ideal = rels.to_vec();
    ideal.sort_by(|a, b| b.total_cmp(a));
    ideal.truncate(k);
    let ideal_dcg = dcg(&ideal);
    let denominator = if ideal_dcg > 0.0 { ideal_dcg } else { 1.0 };
    dcg(top) / denominator
}

/// `1 / rank` of the first relevant result; 0.0 when there is none.
pub fn reciprocal_rank(rels: &[f64]) -> f64 {
    rels.iter()
        .position(|rel| *rel > 0.0)
        .map_or(0.0, |i| 1.0 / (i + 1) as f64)
}

/// 1.0 when any of the first `k` results is relevant.
pub fn recall_at_k(rels: &[f64], k: usize) -> f64 {
    if rels.iter().take(k).any(|rel| *rel > 0.0) {
        1.0
    } else {
        0.0
    }
}

/// How each query of a run is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    pub k: usize,
    pub mode: SearchMode,
    pub rerank: bool,
    pub strategy: ScoringStrategy,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            k: 5,
            mode: SearchMode::Hybrid,
            rerank: false,
            strategy: ScoringStrategy::Balanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEval {
    pub query: String,
    pub retrieved: usize,
    pub relevant: usize,
    pub recall: f64,
    pub reciprocal_rank: f64,
    pub ndcg: f64,
}

/// Averages over one eval set for one mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub mode: SearchMode,
    pub k: usize,
    pub queries: usize,
    pub rerank: bool,
    pub strategy: ScoringStrategy,
    pub recall: f64,
    pub mrr: f64,
    pub ndcg: f64,
    pub per_query: Vec<QueryEval>,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode={} k={} N={}", self.mode, self.k, self.queries)?;
        if self.rerank {
            write!(f, " rerank={}", self.strategy)?;
        }
        write!(
            f,
            " | R@{k}={:.3} MRR={:.3} nDCG@{k}={:.3}",
            self.recall,
            self.mrr,
            self.ndcg,
            k = self.k
        )
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    sum / count.max(1) as f64
}

/// Run every query of `set` through `engine` and score the rankings.
///
/// The first search error aborts the run.
pub async fn evaluate(
    engine: &HybridSearchEngine,
    set: &EvalSet,
    options: EvalOptions,
) -> Result<EvalReport> {
    let topk = i64::try_from(options.k).unwrap_or(i64::MAX);
    let mut per_query = Vec::with_capacity(set.len());

    for item in set.queries() {
        let request = SearchRequest::new(item.q.clone(), topk)
            .mode(options.mode)
            .rerank(options.rerank)
            .strategy(options.strategy);
        let result = engine.search(request).await?;

        let gold: HashSet<&str> = item.gold_urls.iter().map(String::as_str).collect();
        let rels: Vec<f64> = result
            .candidates
            .iter()
            .map(|c| if gold.contains(c.url.as_str()) { 1.0 } else { 0.0 })
            .collect();

        let scored = QueryEval {
            query: item.q.clone(),
            retrieved: rels.len(),
            relevant: rels.iter().filter(|rel| **rel > 0.0).count(),
            recall: recall_at_k(&rels, options.k),
            reciprocal_rank: reciprocal_rank(&rels),
            ndcg: ndcg_at_k(&rels, options.k),
        };
        debug!(
            query = %scored.query,
            retrieved = scored.retrieved,
            relevant = scored.relevant,
            "Eval query scored"
        );
        per_query.push(scored);
    }

    let report = EvalReport {
        mode: options.mode,
        k: options.k,
        queries: per_query.len(),
        rerank: options.rerank,
        strategy: options.strategy,
        recall: mean(per_query.iter().map(|q| q.recall)),
        mrr: mean(per_query.iter().map(|q| q.reciprocal_rank)),
        ndcg: mean(per_query.iter().map(|q| q.ndcg)),
        per_query,
    };
    info!(
        mode = %report.mode,
        k = report.k,
        queries = report.queries,
        recall = report.recall,
        mrr = report.mrr,
        ndcg = report.ndcg,
        "Evaluation finished"
    );
    Ok(report)
}
