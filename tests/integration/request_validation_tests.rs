//! Requests rejected before any retrieval runs.

use hybrank::config::Config;
use hybrank::search::{SearchRequest, SearchMode};
use hybrank::test_utils::fixtures;
use hybrank::HybrankError;

fn assert_invalid(result: hybrank::Result<hybrank::search::SearchResult>) {
    match result {
        Err(HybrankError::InvalidRequest(_)) => {}
        other => panic!("expected InvalidRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejects_out_of_range_topk() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    assert_invalid(engine.search(SearchRequest::new("tokio", 0)).await);
    assert_invalid(engine.search(SearchRequest::new("tokio", -1)).await);
    assert_invalid(engine.search(SearchRequest::new("tokio", 21)).await);
}

#[tokio::test]
async fn test_rejects_blank_and_oversized_text() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    assert_invalid(engine.search(SearchRequest::new("", 3)).await);
    assert_invalid(engine.search(SearchRequest::new(" \t\n ", 3)).await);
    assert_invalid(engine.search(SearchRequest::new("a".repeat(1001), 3)).await);
}

#[tokio::test]
async fn test_rejects_unknown_mode_name() {
    assert!(matches!(
        SearchRequest::parse("tokio", 3, "semantic", false, "balanced"),
        Err(HybrankError::InvalidRequest(_))
    ));
    let ok = SearchRequest::parse("tokio", 3, "dense", false, "rerank_heavy").unwrap();
    assert_eq!(ok.mode, SearchMode::Dense);
}

#[tokio::test]
async fn test_rejected_requests_leave_cache_untouched() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let _ = engine.search(SearchRequest::new("", 3)).await;
    let stats = engine.cache_stats();
    assert_eq!(stats.hits + stats.misses, 0);
}

#[test]
fn test_invalid_config_is_rejected_at_build() {
    let mut config = Config::default();
    config.search.alpha = 2.0;
    let err = fixtures::sample_engine(config).build().unwrap_err();
    assert!(matches!(err, HybrankError::Config(_)));
}
