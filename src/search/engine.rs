//! Hybrid search orchestration
//!
//! [`HybridSearchEngine`] validates a request, serves it from the result
//! cache when possible, and otherwise runs the pipeline once per distinct
//! query: candidate generation on both indexes, fusion, pool selection,
//! optional reranking, composite scoring, truncation and presentation.
//!
//! All collaborators (document store, indexes, embedder, scorer, gate,
//! cache backend) are injected through [`HybridSearchEngineBuilder`] and
//! shared read-only; the engine itself is cheap to clone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::Config;
use crate::corpus::{DocId, DocumentStore, LoadedCorpus};
use crate::error::{HybrankError, Result};
use crate::search::cache::{CacheKey, CacheStats, CacheStore, ResultCache};
use crate::search::composite::CompositeScorer;
use crate::search::dense::DenseIndex;
use crate::search::diversify::select_pool;
use crate::search::embeddings::{Embedder, HashEmbedder};
use crate::search::fusion::{FusionConfig, fuse};
use crate::search::highlight::{extract_keywords, highlight_snippet};
use crate::search::query::{Query, QueryLimits, SearchMode, SearchRequest};
use crate::search::rerank::{AlwaysAllow, RelevanceScorer, RerankGate, RerankOutcome, Reranker};
use crate::search::result::SearchResult;
use crate::search::sparse::SparseIndex;
use crate::search::text::tokenize;
use crate::search::{IndexHandle, IndexKind};

type Hits = Vec<(DocId, f32)>;

/// Read-only state shared by every request and every cached computation.
struct Pipeline {
    config: Config,
    store: Arc<DocumentStore>,
    dense: IndexHandle<dyn DenseIndex>,
    sparse: IndexHandle<dyn SparseIndex>,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
}

impl Pipeline {
    fn dense_hits(&self, query: &Query) -> Result<Hits> {
        let index = self.dense.get()?;
        let embedding =
            self.embedder
                .embed(&query.normalized_text)
                .map_err(|err| HybrankError::IndexUnavailable {
                    index: IndexKind::Dense,
                    reason: format!("query embedding failed: {err}"),
                })?;
        index.search(&embedding, self.config.search.dense_k)
    }

    fn sparse_hits(&self, query: &Query) -> Result<Hits> {
        let index = self.sparse.get()?;
        index.search(&tokenize(&query.normalized_text), self.config.search.sparse_k)
    }

    /// Run both retrieval sides and settle the effective mode, applying the
    /// configured fallbacks when one side of a hybrid request is down.
    fn retrieve(&self, query: &Query) -> Result<(Hits, Hits, SearchMode)> {
        match query.mode {
            SearchMode::Dense => Ok((self.dense_hits(query)?, Vec::new(), SearchMode::Dense)),
            SearchMode::Lexical => Ok((Vec::new(), self.sparse_hits(query)?, SearchMode::Lexical)),
            SearchMode::Hybrid => {
                let (dense, sparse) =
                    rayon::join(|| self.dense_hits(query), || self.sparse_hits(query));
                let search = &self.config.search;
                match (dense, sparse) {
                    (Ok(d), Ok(s)) => Ok((d, s, SearchMode::Hybrid)),
                    (Err(err), Ok(s)) if search.lexical_fallback => {
                        warn!(error = %err, "Dense side down; serving lexical-only");
                        Ok((Vec::new(), s, SearchMode::Lexical))
                    }
                    (Ok(d), Err(err)) if search.dense_fallback => {
                        warn!(error = %err, "Sparse side down; serving dense-only");
                        Ok((d, Vec::new(), SearchMode::Dense))
                    }
                    (Err(err), _) | (_, Err(err)) => Err(err),
                }
            }
        }
    }

    /// [`Self::retrieve`] on the blocking pool; candidate generation is
    /// CPU-bound and must not stall runtime workers.
    async fn retrieve_blocking(
        self: &Arc<Self>,
        query: &Query,
    ) -> Result<(Hits, Hits, SearchMode)> {
        let pipeline = Arc::clone(self);
        let owned = query.clone();
        tokio::task::spawn_blocking(move || pipeline.retrieve(&owned))
            .await
            .map_err(|err| HybrankError::Internal(format!("retrieval task failed: {err}")))?
    }

    async fn execute(self: Arc<Self>, query: &Query) -> Result<SearchResult> {
        let started = Instant::now();

        let (dense, sparse, effective_mode) = self.retrieve_blocking(query).await?;
        let fused = fuse(
            &dense,
            &sparse,
            effective_mode,
            &FusionConfig::from(&self.config.search),
        );
        let total_candidates = fused.len();

        let pool_size = self.config.rerank.pool_size(query.topk);
        let pool = select_pool(&fused, &self.store, &self.config.diversity, pool_size);

        let outcome = if query.rerank_requested {
            let texts = pool
                .iter()
                .map(|c| {
                    self.store
                        .get(c.document_id)
                        .map(|doc| doc.snippet_source.clone())
                        .unwrap_or_default()
                })
                .collect();
            Some(self.reranker.rerank(&query.raw_text, texts).await)
        } else {
            None
        };
        let rerank_scores = outcome.as_ref().and_then(RerankOutcome::scores);

        let mut candidates =
            CompositeScorer::new(query.strategy).score(&pool, rerank_scores, &self.store);
        candidates.truncate(query.topk);

        let keywords = extract_keywords(&query.raw_text);
        for candidate in &mut candidates {
            if let Some(doc) = self.store.get(candidate.document_id) {
                candidate.title.clone_from(&doc.title);
                candidate.url.clone_from(&doc.url);
                candidate.snippet = highlight_snippet(
                    &doc.snippet_source,
                    &keywords,
                    self.config.search.snippet_chars,
                );
            }
        }

        debug!(
            dense = dense.len(),
            sparse = sparse.len(),
            effective_mode = %effective_mode,
            pool = pool.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );

        Ok(SearchResult {
            query: query.normalized_text.clone(),
            mode: query.mode,
            candidates,
            cache_hit: false,
            rerank_applied: outcome.as_ref().is_some_and(RerankOutcome::is_applied),
            strategy_used: query.strategy,
            total_candidates,
        })
    }
}

/// Hybrid dense + lexical search engine.
#[derive(Clone)]
pub struct HybridSearchEngine {
    pipeline: Arc<Pipeline>,
    gate: Arc<dyn RerankGate>,
    cache: Option<ResultCache>,
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("documents", &self.pipeline.store.len())
            .field("dense_available", &self.pipeline.dense.is_available())
            .field("sparse_available", &self.pipeline.sparse.is_available())
            .field("reranker", &self.pipeline.reranker)
            .field("cache", &self.cache)
            .finish()
    }
}

impl HybridSearchEngine {
    pub fn builder(config: Config) -> HybridSearchEngineBuilder {
        HybridSearchEngineBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.pipeline.config
    }

    /// Validate a request and finalize its rerank decision.
    fn prepare(&self, request: &SearchRequest) -> Result<Query> {
        let search = &self.pipeline.config.search;
        let query = Query::validate(
            request,
            QueryLimits {
                topk_max: search.topk_max,
                max_query_chars: search.max_query_chars,
            },
        )?;
        let rerank = query.rerank_requested
            && self.pipeline.config.rerank.enabled
            && self.gate.allows(&query.normalized_text);
        Ok(query.with_rerank(rerank))
    }

    /// Answer one query.
    ///
    /// Fails only with `InvalidRequest` or `IndexUnavailable` (or an
    /// internal error if a shared computation is lost). Reranker and cache
    /// backend problems degrade the result instead.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let query = self.prepare(&request)?;
        let key = CacheKey::for_query(&query);
        let span = info_span!("search", key = key.short());

        async move {
            let started = Instant::now();
            let result = match &self.cache {
                Some(cache) => {
                    let pipeline = Arc::clone(&self.pipeline);
                    let owned = query.clone();
                    let (result, hit) = cache
                        .get_or_compute(key, move || async move { pipeline.execute(&owned).await })
                        .await?;
                    if hit {
                        result.as_cache_hit()
                    } else {
                        SearchResult::clone(&result)
                    }
                }
                None => Arc::clone(&self.pipeline).execute(&query).await?,
            };

            info!(
                query = %query.normalized_text,
                mode = %query.mode,
                topk = query.topk,
                candidates = result.candidates.len(),
                cache_hit = result.cache_hit,
                rerank_applied = result.rerank_applied,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Search complete"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Cache counters; all zero when caching is disabled.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(ResultCache::stats).unwrap_or_default()
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Start the periodic expiry sweep if caching and sweeping are enabled.
    pub fn spawn_cache_sweeper(&self) -> Option<JoinHandle<()>> {
        let seconds = self.pipeline.config.cache.sweep_interval_seconds;
        let cache = self.cache.as_ref()?;
        (seconds > 0).then(|| cache.spawn_sweeper(Duration::from_secs(seconds)))
    }
}

/// Builder for [`HybridSearchEngine`]
pub struct HybridSearchEngineBuilder {
    config: Config,
    store: Option<Arc<DocumentStore>>,
    dense: Option<IndexHandle<dyn DenseIndex>>,
    sparse: Option<IndexHandle<dyn SparseIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    gate: Arc<dyn RerankGate>,
    cache_store: Option<Arc<dyn CacheStore>>,
}

impl HybridSearchEngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            dense: None,
            sparse: None,
            embedder: None,
            scorer: None,
            gate: Arc::new(AlwaysAllow),
            cache_store: None,
        }
    }

    /// Store plus both index handles.
    #[must_use]
    pub fn corpus(mut self, corpus: LoadedCorpus) -> Self {
        self.store = Some(corpus.store);
        self.dense = Some(corpus.dense);
        self.sparse = Some(corpus.sparse);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn dense_index(mut self, dense: IndexHandle<dyn DenseIndex>) -> Self {
        self.dense = Some(dense);
        self
    }

    #[must_use]
    pub fn sparse_index(mut self, sparse: IndexHandle<dyn SparseIndex>) -> Self {
        self.sparse = Some(sparse);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    #[must_use]
    pub fn gate(mut self, gate: Arc<dyn RerankGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the in-memory cache backend.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Assemble the engine.
    ///
    /// A missing index handle is treated as an index that failed to load.
    /// The default embedder is a [`HashEmbedder`] sized to the store.
    pub fn build(self) -> Result<HybridSearchEngine> {
        self.config.validate()?;
        let store = self
            .store
            .ok_or_else(|| HybrankError::Config("engine requires a document store".to_string()))?;

        let dense = self
            .dense
            .unwrap_or_else(|| IndexHandle::unavailable(IndexKind::Dense, "no dense index configured"));
        let sparse = self.sparse.unwrap_or_else(|| {
            IndexHandle::unavailable(IndexKind::Sparse, "no sparse index configured")
        });
        let embedder = self
            .embedder
            .unwrap_or_else(|| Arc::new(HashEmbedder::new(store.dims())));

        let reranker = Reranker::new(
            self.scorer,
            Duration::from_millis(self.config.rerank.timeout_ms),
        );
        let cache = self.config.cache.enabled.then(|| match self.cache_store {
            Some(backend) => {
                ResultCache::new(backend, Duration::from_secs(self.config.cache.ttl_seconds))
            }
            None => ResultCache::from_config(&self.config.cache),
        });

        info!(
            documents = store.len(),
            dense = dense.is_available(),
            sparse = sparse.is_available(),
            reranker = reranker.is_available(),
            cache = cache.is_some(),
            "Search engine ready"
        );

        Ok(HybridSearchEngine {
            pipeline: Arc::new(Pipeline {
                config: self.config,
                store,
                dense,
                sparse,
                embedder,
                reranker,
            }),
            gate: self.gate,
            cache,
        })
    }
}
