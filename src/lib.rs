//! hybrank - hybrid dense + lexical retrieval
//!
//! Fuses embedding-similarity and term-weight rankings, optionally reranks a
//! bounded candidate pool, combines the scores under a named strategy, and
//! caches finished results behind a single-flight TTL cache.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod search;
pub mod test_utils;

pub use error::{HybrankError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
