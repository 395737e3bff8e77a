//! Dense (embedding similarity) retrieval
//!
//! [`DenseIndex`] is the seam for any nearest-neighbour structure.
//! [`FlatDenseIndex`] is the built-in exact scan: cosine over normalized
//! vectors, scored in parallel with rayon.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::corpus::{DocId, DocumentStore};
use crate::error::{HybrankError, Result};
use crate::search::IndexKind;
use crate::search::embeddings::dot_product;

/// Nearest-neighbour search over document embeddings.
///
/// Implementations are read-only after construction and must tolerate any
/// number of concurrent callers.
pub trait DenseIndex: Send + Sync {
    /// Up to `n` `(id, similarity)` pairs, highest similarity first, no
    /// duplicate ids.
    fn search(&self, query_embedding: &[f32], n: usize) -> Result<Vec<(DocId, f32)>>;

    fn dims(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact cosine scan over a contiguous embedding matrix.
#[derive(Debug, Default)]
pub struct FlatDenseIndex {
    ids: Vec<DocId>,
    /// Row-major, `ids.len() * dims` values.
    matrix: Vec<f32>,
    dims: usize,
}

impl FlatDenseIndex {
    /// Build from the store's precomputed (already normalized) embeddings.
    pub fn from_store(store: &DocumentStore) -> Result<Self> {
        let dims = store.dims();
        if dims == 0 {
            return Err(HybrankError::CorpusInvalid(
                "snapshot declares no embedding dimension".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(store.len());
        let mut matrix = Vec::with_capacity(store.len() * dims);
        for doc in store.iter() {
            if doc.embedding.len() != dims {
                return Err(HybrankError::CorpusInvalid(format!(
                    "document {} has {} embedding dims, expected {dims}",
                    doc.id,
                    doc.embedding.len()
                )));
            }
            ids.push(doc.id);
            matrix.extend_from_slice(&doc.embedding);
        }

        Ok(Self { ids, matrix, dims })
    }
}

impl DenseIndex for FlatDenseIndex {
    fn search(&self, query_embedding: &[f32], n: usize) -> Result<Vec<(DocId, f32)>> {
        if query_embedding.len() != self.dims {
            return Err(HybrankError::IndexUnavailable {
                index: IndexKind::Dense,
                reason: format!(
                    "query embedding has {} dims, index expects {}",
                    query_embedding.len(),
                    self.dims
                ),
            });
        }
        if query_embedding.iter().any(|v| !v.is_finite()) {
            return Err(HybrankError::IndexUnavailable {
                index: IndexKind::Dense,
                reason: "query embedding contains non-finite values".to_string(),
            });
        }
        if n == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut scores: Vec<(DocId, f32)> = self
            .matrix
            .par_chunks_exact(self.dims)
            .zip(self.ids.par_iter())
            .map(|(row, &id)| (id, dot_product(query_embedding, row)))
            .collect();

        scores.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scores.truncate(n);
        Ok(scores)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
