//! Ranked output types

use serde::{Deserialize, Serialize};

use crate::corpus::DocId;
use crate::search::query::{ScoringStrategy, SearchMode};

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub document_id: DocId,
    pub title: String,
    pub url: String,
    /// Highlighted, truncated excerpt of the document text
    pub snippet: String,
    /// Raw dense similarity, when the dense side returned this document
    pub dense_score: Option<f32>,
    /// Raw lexical relevance, when the sparse side returned this document
    pub sparse_score: Option<f32>,
    pub fused_score: f32,
    /// Present only when reranking ran successfully
    pub rerank_score: Option<f32>,
    pub final_score: f32,
}

/// Ordered, truncated answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Normalized query text
    pub query: String,
    pub mode: SearchMode,
    pub candidates: Vec<ScoredCandidate>,
    pub cache_hit: bool,
    pub rerank_applied: bool,
    pub strategy_used: ScoringStrategy,
    /// Size of the fused candidate set before truncation
    pub total_candidates: usize,
}

impl SearchResult {
    /// Document ids in rank order.
    pub fn ids(&self) -> Vec<DocId> {
        self.candidates.iter().map(|c| c.document_id).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Copy served from the cache.
    #[must_use]
    pub fn as_cache_hit(&self) -> Self {
        Self {
            cache_hit: true,
            ..self.clone()
        }
    }
}
