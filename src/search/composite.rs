//! Composite scoring strategies and the final ordering
//!
//! Fused and rerank scores are renormalized over the bounded pool, blended
//! by the request's [`ScoringStrategy`], and scaled by the document boost.
//! [`rank_candidates`] owns the tie-break policy so every path that orders
//! results agrees on it.

use std::cmp::Ordering;

use crate::corpus::DocumentStore;
use crate::search::fusion::{FusedCandidate, min_max_normalize};
use crate::search::query::ScoringStrategy;
use crate::search::result::ScoredCandidate;

/// Final scores are compared on a grid of this step, so blends that differ
/// only by f32 rounding noise tie and fall through to the fused score.
pub const SCORE_RESOLUTION: f64 = 1e-6;

/// Applies one scoring strategy to a rerank pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeScorer {
    strategy: ScoringStrategy,
}

impl CompositeScorer {
    pub const fn new(strategy: ScoringStrategy) -> Self {
        Self { strategy }
    }

    pub const fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// `(fused weight, rerank weight)`, or `None` when rerank scores are
    /// ignored.
    pub const fn weights(&self) -> Option<(f32, f32)> {
        match self.strategy {
            ScoringStrategy::Balanced => Some((0.5, 0.5)),
            ScoringStrategy::RerankHeavy => Some((0.2, 0.8)),
            ScoringStrategy::FusedOnly => None,
        }
    }

    /// Score the pool and return it ranked, not yet truncated.
    ///
    /// `rerank_scores` must align with `pool`; a misaligned slice is
    /// ignored. Presentation fields are left empty for the caller.
    pub fn score(
        &self,
        pool: &[FusedCandidate],
        rerank_scores: Option<&[f32]>,
        store: &DocumentStore,
    ) -> Vec<ScoredCandidate> {
        let rerank_scores = rerank_scores.filter(|scores| scores.len() == pool.len());

        let blended: Vec<f32> = match (self.weights(), rerank_scores) {
            (Some((w_fused, w_rerank)), Some(rerank)) => {
                let fused: Vec<f32> = pool.iter().map(|c| c.fused_score).collect();
                let fused_norm = min_max_normalize(&fused);
                let rerank_norm = min_max_normalize(rerank);
                fused_norm
                    .iter()
                    .zip(&rerank_norm)
                    .map(|(f, r)| w_fused.mul_add(*f, w_rerank * r))
                    .collect()
            }
            _ => pool.iter().map(|c| c.fused_score).collect(),
        };

        let mut scored: Vec<ScoredCandidate> = pool
            .iter()
            .zip(blended)
            .enumerate()
            .map(|(i, (candidate, blended))| {
                let boost = store
                    .get(candidate.document_id)
                    .map_or(1.0, |doc| doc.boost);
                ScoredCandidate {
                    document_id: candidate.document_id,
                    title: String::new(),
                    url: String::new(),
                    snippet: String::new(),
                    dense_score: candidate.dense_score,
                    sparse_score: candidate.sparse_score,
                    fused_score: candidate.fused_score,
                    rerank_score: rerank_scores.map(|scores| scores[i]),
                    final_score: blended * boost,
                }
            })
            .collect();

        rank_candidates(&mut scored);
        scored
    }
}

fn score_bucket(score: f32) -> i64 {
    (f64::from(score) / SCORE_RESOLUTION).round() as i64
}

/// Order by final score (descending, within [`SCORE_RESOLUTION`]), then
/// fused score (descending), then document id (ascending).
pub fn rank_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Same ordering as [`rank_candidates`], as a comparator.
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    score_bucket(b.final_score)
        .cmp(&score_bucket(a.final_score))
        .then_with(|| b.fused_score.total_cmp(&a.fused_score))
        .then_with(|| a.document_id.cmp(&b.document_id))
}
