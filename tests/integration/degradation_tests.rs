//! Partial failures: reranker problems degrade, index problems surface.

use std::sync::Arc;
use std::time::Duration;

use hybrank::config::Config;
use hybrank::error::ErrorCode;
use hybrank::search::{HybridSearchEngine, IndexKind, PercentageGate, SearchMode, SearchRequest};
use hybrank::test_utils::doubles::{CountingScorer, FailingEmbedder, FailingScorer, SlowScorer};
use hybrank::test_utils::fixtures::{
    self, DOC_A, DOC_B, FIXTURE_DIMS, scenario_config, scenario_corpus,
};
use hybrank::HybrankError;

#[tokio::test]
async fn test_failing_scorer_falls_back_to_fused_order() {
    let engine = HybridSearchEngine::builder(scenario_config())
        .corpus(scenario_corpus())
        .scorer(Arc::new(FailingScorer))
        .build()
        .unwrap();

    let result = engine
        .search(SearchRequest::new("anything", 2).rerank(true))
        .await
        .unwrap();
    assert!(!result.rerank_applied);
    assert_eq!(result.ids(), vec![DOC_B, DOC_A]);
    assert!(result.candidates.iter().all(|c| c.rerank_score.is_none()));
}

#[tokio::test]
async fn test_slow_scorer_times_out() {
    let mut config = scenario_config();
    config.rerank.timeout_ms = 50;
    let engine = HybridSearchEngine::builder(config)
        .corpus(scenario_corpus())
        .scorer(Arc::new(SlowScorer(Duration::from_millis(400))))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = engine
        .search(SearchRequest::new("anything", 2).rerank(true))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(!result.rerank_applied);
    assert_eq!(result.ids(), vec![DOC_B, DOC_A]);
}

#[tokio::test]
async fn test_missing_scorer_skips_rerank() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let result = engine
        .search(SearchRequest::new("tokio", 3).rerank(true))
        .await
        .unwrap();
    assert!(!result.rerank_applied);
    assert!(!result.is_empty());
}

#[tokio::test]
async fn test_closed_gate_never_calls_scorer() {
    let scorer = Arc::new(CountingScorer::default());
    let engine = fixtures::sample_engine(Config::default())
        .scorer(scorer.clone())
        .gate(Arc::new(PercentageGate::new(0)))
        .build()
        .unwrap();

    let result = engine
        .search(SearchRequest::new("tokio", 3).rerank(true))
        .await
        .unwrap();
    assert!(!result.rerank_applied);
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn test_open_gate_calls_scorer() {
    let scorer = Arc::new(CountingScorer::default());
    let engine = fixtures::sample_engine(Config::default())
        .scorer(scorer.clone())
        .gate(Arc::new(PercentageGate::new(100)))
        .build()
        .unwrap();

    let result = engine
        .search(SearchRequest::new("tokio", 3).rerank(true))
        .await
        .unwrap();
    assert!(result.rerank_applied);
    assert_eq!(scorer.calls(), 1);
}

#[tokio::test]
async fn test_missing_dense_index_is_reported() {
    let corpus = fixtures::sample_corpus();
    let engine = HybridSearchEngine::builder(Config::default())
        .store(corpus.store)
        .sparse_index(corpus.sparse)
        .build()
        .unwrap();

    let err = engine.search(SearchRequest::new("tokio", 3)).await.unwrap_err();
    assert!(matches!(
        err,
        HybrankError::IndexUnavailable {
            index: IndexKind::Dense,
            ..
        }
    ));
    assert_eq!(err.code(), ErrorCode::IndexUnavailable);

    // Lexical requests never touch the dense side.
    let lexical = engine
        .search(SearchRequest::new("tokio", 3).mode(SearchMode::Lexical))
        .await
        .unwrap();
    assert!(!lexical.is_empty());
}

#[tokio::test]
async fn test_lexical_fallback_serves_hybrid_requests() {
    let mut config = Config::default();
    config.search.lexical_fallback = true;
    let corpus = fixtures::sample_corpus();
    let engine = HybridSearchEngine::builder(config)
        .store(corpus.store)
        .sparse_index(corpus.sparse)
        .build()
        .unwrap();

    let result = engine.search(SearchRequest::new("tokio", 3)).await.unwrap();
    assert!(!result.is_empty());
    assert_eq!(result.mode, SearchMode::Hybrid);
    assert!(result.candidates.iter().all(|c| c.dense_score.is_none()));
}

#[tokio::test]
async fn test_dense_fallback_serves_hybrid_requests() {
    let mut config = Config::default();
    config.search.dense_fallback = true;
    let corpus = fixtures::sample_corpus();
    let engine = HybridSearchEngine::builder(config)
        .store(corpus.store)
        .dense_index(corpus.dense)
        .build()
        .unwrap();

    let result = engine.search(SearchRequest::new("tokio", 3)).await.unwrap();
    assert_eq!(result.len(), 3);
    assert!(result.candidates.iter().all(|c| c.sparse_score.is_none()));
}

#[tokio::test]
async fn test_embedding_failure_marks_dense_side_down() {
    let engine = fixtures::sample_engine(Config::default())
        .embedder(Arc::new(FailingEmbedder { dims: FIXTURE_DIMS }))
        .build()
        .unwrap();

    let err = engine
        .search(SearchRequest::new("tokio", 3).mode(SearchMode::Dense))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HybrankError::IndexUnavailable {
            index: IndexKind::Dense,
            ..
        }
    ));
}

#[tokio::test]
async fn test_index_errors_are_not_cached() {
    let engine = HybridSearchEngine::builder(Config::default())
        .store(fixtures::sample_store())
        .build()
        .unwrap();

    for _ in 0..2 {
        assert!(engine.search(SearchRequest::new("tokio", 3)).await.is_err());
    }
    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits, 0);
}
