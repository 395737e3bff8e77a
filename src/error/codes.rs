//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Request errors
//! - 2xx: Index errors
//! - 3xx: Config errors
//! - 4xx: Rerank errors
//! - 5xx: Cache errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for structured output.
///
/// Each variant maps to a numeric code (e.g., `InvalidRequest` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Request errors (1xx)
    // ========================================
    /// E101: Request failed validation (blank query, bad topk, unknown name)
    InvalidRequest,

    // ========================================
    // Index errors (2xx)
    // ========================================
    /// E201: Dense or sparse index is not loaded
    IndexUnavailable,
    /// E202: Corpus snapshot is inconsistent (duplicate ids, bad dimensions)
    CorpusInvalid,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Rerank errors (4xx)
    // ========================================
    /// E401: Pairwise scorer failed or is not configured
    RerankerUnavailable,
    /// E402: Pairwise scorer exceeded its time budget
    RerankerTimeout,

    // ========================================
    // Cache errors (5xx)
    // ========================================
    /// E501: Cache backend read or write failed
    CacheBackend,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal failure
    InternalError,
    /// E902: File operation failed
    IoError,
    /// E903: Serialization/deserialization failed
    SerializationError,
}

impl ErrorCode {
    /// Numeric code for this error.
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::InvalidRequest => 101,

            Self::IndexUnavailable => 201,
            Self::CorpusInvalid => 202,

            Self::ConfigInvalid => 301,

            Self::RerankerUnavailable => 401,
            Self::RerankerTimeout => 402,

            Self::CacheBackend => 501,

            Self::InternalError => 901,
            Self::IoError => 902,
            Self::SerializationError => 903,
        }
    }

    /// Code string in `E<numeric>` form.
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Short recovery hint shown alongside the message.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "Check the query text, topk bound, mode and scoring strategy names",
            Self::IndexUnavailable => "Reload the corpus snapshot, or enable search.lexical_fallback for hybrid requests",
            Self::CorpusInvalid => "Rebuild the corpus snapshot; ids must be unique and embeddings share one dimension",
            Self::ConfigInvalid => "Run `hybrank config` to see current values. Check TOML syntax in config file",
            Self::RerankerUnavailable => "Results fall back to fused scores. Check the scorer backend",
            Self::RerankerTimeout => "Results fall back to fused scores. Raise rerank.timeout_ms or shrink the pool",
            Self::CacheBackend => "Requests are served uncached. Check the cache backend",
            Self::InternalError => "An unexpected error occurred. Please report this issue with full error output",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
        }
    }

    /// Whether the pipeline absorbs this error instead of failing the request.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RerankerUnavailable | Self::RerankerTimeout | Self::CacheBackend
        )
    }

    /// Whether the caller is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest)
    }

    /// Category name used in structured output.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "request",
            Self::IndexUnavailable | Self::CorpusInvalid => "index",
            Self::ConfigInvalid => "config",
            Self::RerankerUnavailable | Self::RerankerTimeout => "rerank",
            Self::CacheBackend => "cache",
            Self::InternalError | Self::IoError | Self::SerializationError => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.numeric())
    }
}
