//! Min-max score fusion for hybrid search
//!
//! Dense similarities and lexical relevances live on unrelated scales, so
//! each side is first rescaled into `[0, 1]` over the scores it actually
//! returned for this request, then blended linearly.
//!
//! ## Algorithm
//!
//! ```text
//! norm(x)  = (x - min) / (max - min)        (1.0 when max == min)
//! fused(d) = alpha * dense_norm(d) + (1 - alpha) * sparse_norm(d)
//! ```
//!
//! A candidate returned by only one side gets `missing_score` for the
//! other. Single-sided modes use that side's normalized score directly.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::SearchConfig;
use crate::corpus::DocId;
use crate::search::query::SearchMode;

/// Fusion configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Weight of the dense side (default: 0.6)
    pub alpha: f32,
    /// Normalized score for a side that did not return the candidate
    pub missing_score: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            missing_score: 0.0,
        }
    }
}

impl FusionConfig {
    /// Create config with a custom alpha
    pub fn with_alpha(alpha: f32) -> Self {
        Self {
            alpha,
            ..Default::default()
        }
    }
}

impl From<&SearchConfig> for FusionConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            alpha: config.alpha,
            missing_score: config.missing_score,
        }
    }
}

/// A single fused candidate
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub document_id: DocId,
    /// Raw dense similarity (None if the dense side did not return it)
    pub dense_score: Option<f32>,
    /// Raw lexical relevance (None if the sparse side did not return it)
    pub sparse_score: Option<f32>,
    /// Blended score in `[0, 1]`
    pub fused_score: f32,
}

/// Rescale scores into `[0, 1]`.
///
/// An empty slice yields an empty vector; a slice whose values are all
/// equal maps every value to `1.0`.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(&first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores
        .iter()
        .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if range <= 0.0 {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| ((s - min) / range).clamp(0.0, 1.0)).collect()
}

/// Normalized scores keyed by document id. The first occurrence of an id
/// wins, so a side that lists an id twice cannot inflate it.
fn normalized_side(results: &[(DocId, f32)]) -> HashMap<DocId, (f32, f32)> {
    let finite: Vec<(DocId, f32)> = results
        .iter()
        .copied()
        .filter(|(_, score)| score.is_finite())
        .collect();
    let raw: Vec<f32> = finite.iter().map(|(_, s)| *s).collect();
    let norms = min_max_normalize(&raw);

    let mut side = HashMap::with_capacity(finite.len());
    for ((id, score), norm) in finite.into_iter().zip(norms) {
        side.entry(id).or_insert((score, norm));
    }
    side
}

/// Fuse dense and sparse results.
///
/// `mode` is the effective mode for the request: a hybrid request whose
/// dense side fell back passes [`SearchMode::Lexical`] here, and the
/// ignored side's list is disregarded.
///
/// The output covers the deduplicated union of returned ids, sorted by
/// fused score (descending) then document id (ascending).
pub fn fuse(
    dense: &[(DocId, f32)],
    sparse: &[(DocId, f32)],
    mode: SearchMode,
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let dense_side = if mode.uses_dense() {
        normalized_side(dense)
    } else {
        HashMap::new()
    };
    let sparse_side = if mode.uses_sparse() {
        normalized_side(sparse)
    } else {
        HashMap::new()
    };

    let alpha = config.alpha.clamp(0.0, 1.0);
    let mut ids: Vec<DocId> = dense_side.keys().chain(sparse_side.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut results: Vec<FusedCandidate> = ids
        .into_iter()
        .map(|id| {
            let dense_entry = dense_side.get(&id);
            let sparse_entry = sparse_side.get(&id);
            let dense_norm = dense_entry.map_or(config.missing_score, |(_, n)| *n);
            let sparse_norm = sparse_entry.map_or(config.missing_score, |(_, n)| *n);

            let fused = match mode {
                SearchMode::Dense => dense_norm,
                SearchMode::Lexical => sparse_norm,
                SearchMode::Hybrid => alpha
                    .mul_add(dense_norm, (1.0 - alpha) * sparse_norm)
                    .clamp(0.0, 1.0),
            };

            FusedCandidate {
                document_id: id,
                dense_score: dense_entry.map(|(raw, _)| *raw),
                sparse_score: sparse_entry.map(|(raw, _)| *raw),
                fused_score: fused,
            }
        })
        .collect();

    sort_by_fused(&mut results);
    results
}

/// Fused score descending, then document id ascending.
pub(crate) fn sort_by_fused(candidates: &mut [FusedCandidate]) {
    candidates.sort_by(|a, b| match b.fused_score.total_cmp(&a.fused_score) {
        Ordering::Equal => a.document_id.cmp(&b.document_id),
        other => other,
    });
}
