//! Rerank pool selection and result diversification
//!
//! Without diversification the pool is simply the top of the fused list.
//! With it, chunks are first capped per source URL, then picked greedily by
//! maximal marginal relevance:
//!
//! ```text
//! mmr(d) = lambda * fused(d) - (1 - lambda) * max_{s in selected} cos(d, s)
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::config::DiversityConfig;
use crate::corpus::DocumentStore;
use crate::search::embeddings::dot_product;
use crate::search::fusion::FusedCandidate;

/// Pick the `n` candidates that go on to reranking and composite scoring.
///
/// `fused` must already be sorted by fused score.
pub fn select_pool(
    fused: &[FusedCandidate],
    store: &DocumentStore,
    config: &DiversityConfig,
    n: usize,
) -> Vec<FusedCandidate> {
    if !config.enabled {
        return fused.iter().take(n).cloned().collect();
    }

    let limited = limit_per_url(fused, store, config.max_chunks_per_url);
    let pool = mmr_select(&limited, store, config.mmr_lambda, n);
    debug!(
        fused = fused.len(),
        url_limited = limited.len(),
        pool = pool.len(),
        "Diversified rerank pool"
    );
    pool
}

/// Keep at most `max_per_url` chunks from any one URL, preserving order.
/// A limit of zero disables the cap.
pub fn limit_per_url(
    candidates: &[FusedCandidate],
    store: &DocumentStore,
    max_per_url: usize,
) -> Vec<FusedCandidate> {
    if max_per_url == 0 {
        return candidates.to_vec();
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    candidates
        .iter()
        .filter(|candidate| {
            let Some(doc) = store.get(candidate.document_id) else {
                return true;
            };
            let count = seen.entry(doc.url.as_str()).or_insert(0);
            *count += 1;
            *count <= max_per_url
        })
        .cloned()
        .collect()
}

/// Greedy maximal-marginal-relevance selection of up to `n` candidates.
///
/// The first pick is the best fused candidate; ties on the MMR score keep
/// the earlier (better fused) candidate.
pub fn mmr_select(
    candidates: &[FusedCandidate],
    store: &DocumentStore,
    lambda: f32,
    n: usize,
) -> Vec<FusedCandidate> {
    if candidates.is_empty() || n == 0 {
        return Vec::new();
    }

    let embeddings: Vec<&[f32]> = candidates
        .iter()
        .map(|c| store.get(c.document_id).map_or(&[][..], |d| d.embedding.as_slice()))
        .collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut max_similarity = vec![f32::NEG_INFINITY; candidates.len()];
    let mut selected = Vec::with_capacity(n.min(candidates.len()));

    let mut next = 0;
    loop {
        let chosen = remaining.remove(next);
        selected.push(candidates[chosen].clone());
        if selected.len() >= n || remaining.is_empty() {
            break;
        }

        for &idx in &remaining {
            let sim = cosine(embeddings[idx], embeddings[chosen]);
            if sim > max_similarity[idx] {
                max_similarity[idx] = sim;
            }
        }

        let mut best_score = f32::NEG_INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let score = lambda.mul_add(
                candidates[idx].fused_score,
                -(1.0 - lambda) * max_similarity[idx],
            );
            if score > best_score {
                best_score = score;
                next = pos;
            }
        }
        if !best_score.is_finite() {
            next = 0;
        }
    }

    selected
}

/// Cosine of two normalized vectors; zero when either is missing.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    dot_product(a, b)
}
