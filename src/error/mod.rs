//! Error handling for hybrank.
//!
//! This module provides:
//! - [`HybrankError`]: The main error enum for all operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Serializable error with code, category and hint
//!
//! Errors are `Clone` so a single in-flight computation can hand the same
//! failure to every waiter.

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

use crate::search::IndexKind;

/// Main error type for hybrank operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HybrankError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{index} index unavailable: {reason}")]
    IndexUnavailable { index: IndexKind, reason: String },

    #[error("Invalid corpus: {0}")]
    CorpusInvalid(String),

    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("Reranker timed out after {timeout_ms}ms")]
    RerankerTimeout { timeout_ms: u64 },

    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HybrankError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::IndexUnavailable { .. } => ErrorCode::IndexUnavailable,
            Self::CorpusInvalid(_) => ErrorCode::CorpusInvalid,
            Self::RerankerUnavailable(_) => ErrorCode::RerankerUnavailable,
            Self::RerankerTimeout { .. } => ErrorCode::RerankerTimeout,
            Self::CacheBackend(_) => ErrorCode::CacheBackend,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Shorthand for the recoverable check on the error code.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::IndexUnavailable { index, reason } => {
                Some(serde_json::json!({ "index": index.as_str(), "reason": reason }))
            }
            Self::RerankerTimeout { timeout_ms } => {
                Some(serde_json::json!({ "timeout_ms": timeout_ms }))
            }
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_error(self)
    }
}

impl From<io::Error> for HybrankError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HybrankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "INDEX_UNAVAILABLE")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 201)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether the pipeline absorbs this error
    pub recoverable: bool,

    /// Error category (e.g., "request", "index", "cache")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a [`HybrankError`].
    #[must_use]
    pub fn from_error(err: &HybrankError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&HybrankError> for StructuredError {
    fn from(err: &HybrankError) -> Self {
        Self::from_error(err)
    }
}

/// Result type alias using [`HybrankError`].
pub type Result<T> = std::result::Result<T, HybrankError>;
