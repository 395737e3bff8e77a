//! Hybrid retrieval and ranking pipeline
//!
//! Dense similarity and lexical relevance are normalized per request,
//! blended, optionally reranked on a bounded pool, and resolved into a
//! final order by a named composite strategy.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │             SearchRequest ─► validate ─► ResultCache            │
//! └────────────────────────────────────────────────────────────────┘
//!                     │ (miss, single-flight)    │
//!                     ▼                          ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │       DenseIndex             │  │       SparseIndex            │
//! │   (embedding similarity)     │  │   (term-weight overlap)      │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                     │                          │
//!                     └──────────┬───────────────┘
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │   Min-max fusion (fusion.rs)  │
//!                └───────────────────────────────┘
//!                                │  top-N pool (diversify.rs)
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │  Reranker (rerank.rs, timed)  │
//!                └───────────────────────────────┘
//!                                │
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │ Composite strategy + tiebreak │
//!                └───────────────────────────────┘
//!                                │
//!                                ▼
//!                       Truncated SearchResult
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HybrankError, Result};

pub mod cache;
pub mod composite;
pub mod dense;
pub mod diversify;
pub mod embeddings;
pub mod engine;
pub mod eval;
pub mod fusion;
pub mod highlight;
pub mod query;
pub mod rerank;
pub mod result;
pub mod sparse;
pub mod text;

// Re-export main types
pub use cache::{CacheKey, CacheStats, CacheStore, MemoryStore, ResultCache};
pub use composite::{CompositeScorer, rank_candidates};
pub use dense::{DenseIndex, FlatDenseIndex};
pub use embeddings::{Embedder, HashEmbedder};
pub use engine::{HybridSearchEngine, HybridSearchEngineBuilder};
pub use eval::{EvalOptions, EvalQuery, EvalReport, EvalSet, evaluate};
pub use fusion::{FusedCandidate, FusionConfig, fuse, min_max_normalize};
pub use query::{Query, ScoringStrategy, SearchMode, SearchRequest};
pub use rerank::{
    AlwaysAllow, PercentageGate, RelevanceScorer, RerankGate, RerankOutcome, Reranker,
    TermOverlapScorer,
};
pub use result::{ScoredCandidate, SearchResult};
pub use sparse::{SparseIndex, TermWeightIndex};

/// Which of the two retrieval indexes an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Dense,
    Sparse,
}

impl IndexKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A shared index that either loaded or failed to load at startup.
pub struct IndexHandle<T: ?Sized> {
    kind: IndexKind,
    state: std::result::Result<Arc<T>, String>,
}

impl<T: ?Sized> IndexHandle<T> {
    pub fn ready(index: Arc<T>) -> Self
    where
        T: IndexKindOf,
    {
        Self {
            kind: T::KIND,
            state: Ok(index),
        }
    }

    pub fn unavailable(kind: IndexKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            state: Err(reason.into()),
        }
    }

    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    pub const fn is_available(&self) -> bool {
        self.state.is_ok()
    }

    /// The index, or `IndexUnavailable` carrying the load failure.
    pub fn get(&self) -> Result<&Arc<T>> {
        self.state
            .as_ref()
            .map_err(|reason| HybrankError::IndexUnavailable {
                index: self.kind,
                reason: reason.clone(),
            })
    }
}

impl<T: ?Sized> Clone for IndexHandle<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            state: self.state.clone(),
        }
    }
}

/// Ties an index trait object to the side it serves.
pub trait IndexKindOf {
    const KIND: IndexKind;
}

impl IndexKindOf for dyn DenseIndex {
    const KIND: IndexKind = IndexKind::Dense;
}

impl IndexKindOf for dyn SparseIndex {
    const KIND: IndexKind = IndexKind::Sparse;
}
