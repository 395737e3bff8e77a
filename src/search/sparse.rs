//! Sparse (lexical) retrieval over precomputed term weights
//!
//! Relevance is the dot product between the query's term frequencies and a
//! document's term weights (the TF-IDF matrix product the ingestion side
//! prepares). Postings are grouped by term so a query only touches the
//! documents that share at least one term with it.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::corpus::{DocId, DocumentStore};
use crate::error::{HybrankError, Result};
use crate::search::text::term_counts;

/// Lexical relevance scorer.
///
/// Read-only after construction; safe for concurrent callers.
pub trait SparseIndex: Send + Sync {
    /// Up to `n` `(id, relevance)` pairs, highest first. Relevance is
    /// non-negative and documents scoring zero are omitted.
    fn search(&self, query_terms: &[String], n: usize) -> Result<Vec<(DocId, f32)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inverted index: term → postings of `(doc id, weight)`.
#[derive(Debug, Default)]
pub struct TermWeightIndex {
    postings: HashMap<String, Vec<(DocId, f32)>>,
    documents: usize,
}

impl TermWeightIndex {
    /// Build postings from the store's term weights.
    ///
    /// A non-empty store where no document carries term weights means the
    /// sparse side was never built; that is reported as an error.
    pub fn from_store(store: &DocumentStore) -> Result<Self> {
        let mut postings: HashMap<String, Vec<(DocId, f32)>> = HashMap::new();
        for doc in store.iter() {
            for (term, &weight) in &doc.term_weights {
                if weight > 0.0 {
                    postings.entry(term.clone()).or_default().push((doc.id, weight));
                }
            }
        }

        if postings.is_empty() && !store.is_empty() {
            return Err(HybrankError::CorpusInvalid(
                "snapshot carries no term weights".to_string(),
            ));
        }

        for list in postings.values_mut() {
            list.sort_by_key(|(id, _)| *id);
        }

        Ok(Self {
            postings,
            documents: store.len(),
        })
    }

    /// Number of distinct indexed terms.
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }
}

impl SparseIndex for TermWeightIndex {
    fn search(&self, query_terms: &[String], n: usize) -> Result<Vec<(DocId, f32)>> {
        if n == 0 || query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for (term, tf) in term_counts(query_terms) {
            if let Some(list) = self.postings.get(term) {
                for &(id, weight) in list {
                    *scores.entry(id).or_insert(0.0) += tf * weight;
                }
            }
        }

        let mut results: Vec<(DocId, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0 && score.is_finite())
            .collect();
        results.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        results.truncate(n);
        Ok(results)
    }

    fn len(&self) -> usize {
        self.documents
    }
}
