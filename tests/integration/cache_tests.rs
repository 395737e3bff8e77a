//! Result cache behaviour through the engine: TTL, coalescing, backends.

use std::sync::Arc;
use std::time::Duration;

use hybrank::config::Config;
use hybrank::search::query::QueryLimits;
use hybrank::search::{CacheKey, CacheStore, Query, SearchRequest};
use hybrank::test_utils::doubles::{CountingScorer, FailingStore};
use hybrank::test_utils::fixtures;
use hybrank::test_utils::logging::TestLogger;

#[tokio::test]
async fn test_repeat_query_is_served_from_cache() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let request = SearchRequest::new("tokio runtime", 3);

    let first = engine.search(request.clone()).await.unwrap();
    let second = engine.search(request).await.unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.ids(), second.ids());
    assert_eq!(first.candidates.len(), second.candidates.len());
    for (fresh, cached) in first.candidates.iter().zip(&second.candidates) {
        assert_eq!(fresh.final_score.to_bits(), cached.final_score.to_bits());
        assert_eq!(fresh.fused_score.to_bits(), cached.fused_score.to_bits());
        assert_eq!(fresh.snippet, cached.snippet);
    }
    assert_eq!(first.total_candidates, second.total_candidates);

    let stats = engine.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
    assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_equivalent_queries_share_an_entry() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();

    engine.search(SearchRequest::new("Tokio  Runtime", 3)).await.unwrap();
    let again = engine.search(SearchRequest::new("tokio runtime ", 3)).await.unwrap();
    assert!(again.cache_hit);

    // Different topk is a different key.
    let other = engine.search(SearchRequest::new("tokio runtime", 4)).await.unwrap();
    assert!(!other.cache_hit);
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let mut config = Config::default();
    config.cache.ttl_seconds = 1;
    let engine = fixtures::sample_engine(config).build().unwrap();
    let request = SearchRequest::new("serde derive", 2);

    engine.search(request.clone()).await.unwrap();
    assert!(engine.search(request.clone()).await.unwrap().cache_hit);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let refreshed = engine.search(request).await.unwrap();
    assert!(!refreshed.cache_hit);
    assert!(engine.cache_stats().expirations >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_compute_once() {
    let log = TestLogger::new("test_concurrent_identical_requests_compute_once");
    let scorer = Arc::new(CountingScorer::with_delay(Duration::from_millis(200)));
    let engine = fixtures::sample_engine(Config::default())
        .scorer(scorer.clone())
        .build()
        .unwrap();
    let request = SearchRequest::new("async cancellation", 3).rerank(true);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let request = request.clone();
            tokio::spawn(async move { engine.search(request).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    log.log_actual(&engine.cache_stats());

    assert_eq!(scorer.calls(), 1);
    assert!(results.iter().all(|r| r.rerank_applied));
    assert!(results.iter().all(|r| r.ids() == results[0].ids()));
    let stats = engine.cache_stats();
    assert_eq!(stats.hits + stats.misses, 8);
    assert_eq!(stats.in_flight, 0);
    log.pass();
}

#[tokio::test]
async fn test_cache_disabled_recomputes() {
    let mut config = Config::default();
    config.cache.enabled = false;
    let scorer = Arc::new(CountingScorer::default());
    let engine = fixtures::sample_engine(config)
        .scorer(scorer.clone())
        .build()
        .unwrap();
    let request = SearchRequest::new("rayon parallel iterators", 3).rerank(true);

    let first = engine.search(request.clone()).await.unwrap();
    let second = engine.search(request).await.unwrap();

    assert!(!second.cache_hit);
    assert_eq!(first.ids(), second.ids());
    assert_eq!(scorer.calls(), 2);
    assert!(engine.cache().is_none());
}

#[tokio::test]
async fn test_failing_backend_does_not_fail_search() {
    let backend = Arc::new(FailingStore::default());
    let engine = fixtures::sample_engine(Config::default())
        .cache_store(backend.clone())
        .build()
        .unwrap();
    let request = SearchRequest::new("thiserror enums", 3);

    let first = engine.search(request.clone()).await.unwrap();
    let second = engine.search(request).await.unwrap();

    assert!(!first.is_empty());
    assert!(!second.cache_hit);
    assert!(backend.attempts() >= 2);
    assert!(engine.cache_stats().backend_errors >= 2);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let cache = engine.cache().unwrap().clone();

    engine.search(SearchRequest::new("lifetimes", 2)).await.unwrap();
    engine.search(SearchRequest::new("channels", 2)).await.unwrap();
    assert_eq!(engine.cache_stats().entries, 2);

    cache.clear();
    assert_eq!(engine.cache_stats().entries, 0);
    let after = engine.search(SearchRequest::new("lifetimes", 2)).await.unwrap();
    assert!(!after.cache_hit);

    let limits = QueryLimits {
        topk_max: 20,
        max_query_chars: 1000,
    };
    let key = CacheKey::for_query(&Query::validate(&SearchRequest::new("channels", 2), limits).unwrap());
    assert!(cache.invalidate(&key));
    assert!(!cache.invalidate(&key));
    let refetched = engine.search(SearchRequest::new("channels", 2)).await.unwrap();
    assert!(!refetched.cache_hit);
}

#[test]
fn test_failing_store_reports_empty() {
    let store = FailingStore::default();
    assert_eq!(store.len(), 0);
    assert!(store.is_empty());
}
