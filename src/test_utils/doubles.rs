//! Test doubles for the engine's external collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::corpus::DocId;
use crate::error::{HybrankError, Result};
use crate::search::cache::{CacheEntry, CacheKey, CacheStore};
use crate::search::dense::DenseIndex;
use crate::search::embeddings::Embedder;
use crate::search::rerank::{RelevanceScorer, TermOverlapScorer};
use crate::search::sparse::SparseIndex;

/// Dense index that returns the same ranked list for every query.
#[derive(Debug, Clone)]
pub struct StaticDenseIndex {
    dims: usize,
    hits: Vec<(DocId, f32)>,
}

impl StaticDenseIndex {
    pub fn new(dims: usize, hits: Vec<(DocId, f32)>) -> Self {
        Self { dims, hits }
    }
}

impl DenseIndex for StaticDenseIndex {
    fn search(&self, _query_embedding: &[f32], n: usize) -> Result<Vec<(DocId, f32)>> {
        Ok(self.hits.iter().take(n).copied().collect())
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Dense index that blocks the calling thread before delegating.
#[derive(Debug, Clone)]
pub struct SlowDenseIndex<I> {
    inner: I,
    delay: Duration,
}

impl<I> SlowDenseIndex<I> {
    pub fn new(inner: I, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<I: DenseIndex> DenseIndex for SlowDenseIndex<I> {
    fn search(&self, query_embedding: &[f32], n: usize) -> Result<Vec<(DocId, f32)>> {
        std::thread::sleep(self.delay);
        self.inner.search(query_embedding, n)
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Sparse index that returns the same ranked list for every query.
#[derive(Debug, Clone)]
pub struct StaticSparseIndex {
    hits: Vec<(DocId, f32)>,
}

impl StaticSparseIndex {
    pub fn new(hits: Vec<(DocId, f32)>) -> Self {
        Self { hits }
    }
}

impl SparseIndex for StaticSparseIndex {
    fn search(&self, _query_terms: &[String], n: usize) -> Result<Vec<(DocId, f32)>> {
        Ok(self.hits.iter().take(n).copied().collect())
    }

    fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Term-overlap scorer that counts executions and can be slowed down.
#[derive(Debug, Default)]
pub struct CountingScorer {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingScorer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RelevanceScorer for CountingScorer {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        TermOverlapScorer.score(query, documents)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Scorer returning fixed scores, whatever the candidates.
#[derive(Debug, Clone)]
pub struct FixedScorer(pub Vec<f32>);

impl RelevanceScorer for FixedScorer {
    fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Scorer that always errors, as an unreachable model server would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingScorer;

impl RelevanceScorer for FailingScorer {
    fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
        Err(HybrankError::RerankerUnavailable("model server unreachable".into()))
    }
}

/// Scorer that sleeps before answering.
#[derive(Debug, Clone, Copy)]
pub struct SlowScorer(pub Duration);

impl RelevanceScorer for SlowScorer {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        std::thread::sleep(self.0);
        TermOverlapScorer.score(query, documents)
    }
}

/// Embedder that always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingEmbedder {
    pub dims: usize,
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(HybrankError::Internal("embedding model not loaded".into()))
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Cache backend where every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(HybrankError::CacheBackend("connection refused".into()))
    }
}

impl CacheStore for FailingStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.fail()
    }

    fn put(&self, _key: CacheKey, _entry: CacheEntry) -> Result<()> {
        self.fail()
    }

    fn remove(&self, _key: &CacheKey) -> Result<bool> {
        self.fail()
    }

    fn clear(&self) -> Result<()> {
        self.fail()
    }

    fn purge_expired(&self, _now: Instant) -> Result<usize> {
        self.fail()
    }

    fn len(&self) -> usize {
        0
    }
}
