//! Search requests and validated queries
//!
//! A [`SearchRequest`] is what a caller hands in; [`Query`] is the
//! validated, normalized value the pipeline runs on. Mode and strategy
//! names are parsed into closed enums at this boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HybrankError, Result};
use crate::search::text::normalize_query;

/// Which retrieval paths run for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Embedding similarity only
    Dense,
    /// Term-weight relevance only
    Lexical,
    /// Both, blended by alpha
    Hybrid,
}

impl SearchMode {
    pub const ALL: [Self; 3] = [Self::Dense, Self::Lexical, Self::Hybrid];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }

    pub const fn uses_dense(&self) -> bool {
        matches!(self, Self::Dense | Self::Hybrid)
    }

    pub const fn uses_sparse(&self) -> bool {
        matches!(self, Self::Lexical | Self::Hybrid)
    }
}

impl FromStr for SearchMode {
    type Err = HybrankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dense" => Ok(Self::Dense),
            "lexical" | "sparse" | "bm25" => Ok(Self::Lexical),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(HybrankError::InvalidRequest(format!(
                "unknown search mode '{other}' (expected dense|lexical|hybrid)"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named rule for turning fused and rerank scores into a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Equal weight on fused and rerank scores
    Balanced,
    /// 0.2 fused / 0.8 rerank
    RerankHeavy,
    /// Fused score only, rerank scores ignored
    FusedOnly,
}

impl ScoringStrategy {
    pub const ALL: [Self; 3] = [Self::Balanced, Self::RerankHeavy, Self::FusedOnly];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::RerankHeavy => "rerank_heavy",
            Self::FusedOnly => "fused_only",
        }
    }
}

impl FromStr for ScoringStrategy {
    type Err = HybrankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "balanced" => Ok(Self::Balanced),
            "rerank_heavy" => Ok(Self::RerankHeavy),
            "fused_only" | "hybrid_only" => Ok(Self::FusedOnly),
            other => Err(HybrankError::InvalidRequest(format!(
                "unknown scoring strategy '{other}' (expected balanced|rerank_heavy|fused_only)"
            ))),
        }
    }
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unvalidated caller input.
///
/// `topk` is signed so out-of-range input reaches validation instead of
/// being coerced by the type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub topk: i64,
    pub mode: SearchMode,
    pub rerank: bool,
    pub strategy: ScoringStrategy,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, topk: i64) -> Self {
        Self {
            text: text.into(),
            topk,
            mode: SearchMode::Hybrid,
            rerank: false,
            strategy: ScoringStrategy::Balanced,
        }
    }

    /// Build a request from string-typed mode and strategy names.
    pub fn parse(
        text: impl Into<String>,
        topk: i64,
        mode: &str,
        rerank: bool,
        strategy: &str,
    ) -> Result<Self> {
        Ok(Self {
            text: text.into(),
            topk,
            mode: mode.parse()?,
            rerank,
            strategy: strategy.parse()?,
        })
    }

    pub const fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub const fn rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub const fn strategy(mut self, strategy: ScoringStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Bounds applied during validation.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub topk_max: usize,
    pub max_query_chars: usize,
}

/// A validated, normalized query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub normalized_text: String,
    pub mode: SearchMode,
    pub topk: usize,
    pub rerank_requested: bool,
    pub strategy: ScoringStrategy,
}

impl Query {
    /// Validate a request. Nothing is coerced: every violation is an
    /// `InvalidRequest`.
    pub fn validate(request: &SearchRequest, limits: QueryLimits) -> Result<Self> {
        let normalized_text = normalize_query(&request.text);
        if normalized_text.is_empty() {
            return Err(HybrankError::InvalidRequest(
                "query text cannot be empty".to_string(),
            ));
        }
        let chars = request.text.trim().chars().count();
        if chars > limits.max_query_chars {
            return Err(HybrankError::InvalidRequest(format!(
                "query text exceeds maximum length of {} characters ({chars})",
                limits.max_query_chars
            )));
        }

        let topk = usize::try_from(request.topk)
            .ok()
            .filter(|k| (1..=limits.topk_max).contains(k))
            .ok_or_else(|| {
                HybrankError::InvalidRequest(format!(
                    "topk must be within 1..={}, got {}",
                    limits.topk_max, request.topk
                ))
            })?;

        Ok(Self {
            raw_text: request.text.trim().to_string(),
            normalized_text,
            mode: request.mode,
            topk,
            rerank_requested: request.rerank,
            strategy: request.strategy,
        })
    }

    /// Final rerank decision after the gate and the global switch.
    #[must_use]
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank_requested = rerank;
        self
    }
}
