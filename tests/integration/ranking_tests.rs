//! Ranking behaviour: fusion order, composite strategies, diversity.

use std::collections::HashSet;
use std::sync::Arc;

use hybrank::config::Config;
use hybrank::search::{HybridSearchEngine, ScoringStrategy, SearchMode, SearchRequest};
use hybrank::test_utils::doubles::FixedScorer;
use hybrank::test_utils::fixtures::{
    self, DOC_A, DOC_B, DOC_C, scenario_config, scenario_corpus,
};
use hybrank::test_utils::logging::TestLogger;

fn scenario_engine(config: Config) -> HybridSearchEngine {
    HybridSearchEngine::builder(config)
        .corpus(scenario_corpus())
        .scorer(Arc::new(FixedScorer(vec![0.0, 1.0, 0.5])))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_hybrid_fusion_order() {
    let log = TestLogger::new("test_hybrid_fusion_order");
    let engine = scenario_engine(scenario_config());

    let result = engine.search(SearchRequest::new("anything", 2)).await.unwrap();
    log.log_actual(&result.ids());

    assert_eq!(result.ids(), vec![DOC_B, DOC_A]);
    assert!((result.candidates[0].fused_score - 0.722_222).abs() < 1e-4);
    assert!((result.candidates[1].fused_score - 0.5).abs() < 1e-6);
    assert_eq!(result.candidates[0].dense_score, Some(0.4));
    assert_eq!(result.candidates[0].sparse_score, Some(0.9));
    assert_eq!(result.total_candidates, 3);
    assert!(!result.rerank_applied);
    assert!(!result.cache_hit);
    log.pass();
}

#[tokio::test]
async fn test_single_modes_use_one_side() {
    let engine = scenario_engine(scenario_config());

    let dense = engine
        .search(SearchRequest::new("anything", 3).mode(SearchMode::Dense))
        .await
        .unwrap();
    assert_eq!(dense.ids(), vec![DOC_A, DOC_B, DOC_C]);
    assert_eq!(dense.mode, SearchMode::Dense);

    let lexical = engine
        .search(SearchRequest::new("anything", 3).mode(SearchMode::Lexical))
        .await
        .unwrap();
    // C never appears in the sparse results.
    assert_eq!(lexical.ids(), vec![DOC_B, DOC_A]);
}

#[tokio::test]
async fn test_rerank_strategies_reorder_pool() {
    let engine = scenario_engine(scenario_config());
    let request = SearchRequest::new("anything", 3).rerank(true);

    let balanced = engine
        .search(request.clone().strategy(ScoringStrategy::Balanced))
        .await
        .unwrap();
    assert!(balanced.rerank_applied);
    assert_eq!(balanced.ids(), vec![DOC_A, DOC_B, DOC_C]);

    let heavy = engine
        .search(request.clone().strategy(ScoringStrategy::RerankHeavy))
        .await
        .unwrap();
    assert_eq!(heavy.ids(), vec![DOC_A, DOC_C, DOC_B]);
    assert_eq!(heavy.strategy_used, ScoringStrategy::RerankHeavy);

    let fused_only = engine
        .search(request.strategy(ScoringStrategy::FusedOnly))
        .await
        .unwrap();
    assert_eq!(fused_only.ids(), vec![DOC_B, DOC_A, DOC_C]);
    assert_eq!(fused_only.candidates[1].rerank_score, Some(1.0));
}

#[tokio::test]
async fn test_rerank_keeps_candidate_set() {
    let engine = scenario_engine(scenario_config());
    let plain = engine.search(SearchRequest::new("anything", 3)).await.unwrap();
    let reranked = engine
        .search(SearchRequest::new("anything", 3).rerank(true))
        .await
        .unwrap();

    let before: HashSet<_> = plain.ids().into_iter().collect();
    let after: HashSet<_> = reranked.ids().into_iter().collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_rerank_disabled_globally() {
    let mut config = scenario_config();
    config.rerank.enabled = false;
    let engine = scenario_engine(config);

    let result = engine
        .search(SearchRequest::new("anything", 2).rerank(true))
        .await
        .unwrap();
    assert!(!result.rerank_applied);
    assert_eq!(result.ids(), vec![DOC_B, DOC_A]);
}

#[tokio::test]
async fn test_results_are_deterministic() {
    let mut config = Config::default();
    config.cache.enabled = false;
    let engine = fixtures::sample_engine(config).build().unwrap();
    let request = SearchRequest::new("async tasks on tokio", 5).rerank(true);

    let first = engine.search(request.clone()).await.unwrap();
    for _ in 0..5 {
        let again = engine.search(request.clone()).await.unwrap();
        assert_eq!(again.ids(), first.ids());
        for (a, b) in again.candidates.iter().zip(&first.candidates) {
            assert_eq!(a.final_score.to_bits(), b.final_score.to_bits());
        }
    }
}

#[tokio::test]
async fn test_results_are_bounded_and_unique() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    for topk in [1, 3, 8, 20] {
        let result = engine
            .search(SearchRequest::new("tokio async runtime borrow checker", topk))
            .await
            .unwrap();
        assert!(result.len() <= topk as usize);
        let unique: HashSet<_> = result.ids().into_iter().collect();
        assert_eq!(unique.len(), result.len());
        for candidate in &result.candidates {
            assert!(candidate.fused_score >= 0.0 && candidate.fused_score <= 1.0);
        }
    }
}

#[tokio::test]
async fn test_snippets_are_highlighted() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let result = engine
        .search(SearchRequest::new("borrow checker", 3).mode(SearchMode::Lexical))
        .await
        .unwrap();

    let top = &result.candidates[0];
    assert!(!top.title.is_empty());
    assert!(top.url.starts_with("https://docs.example.com/"));
    assert!(top.snippet.contains("<em>"), "snippet: {}", top.snippet);
}

#[tokio::test]
async fn test_diversity_limits_chunks_per_url() {
    let mut config = Config::default();
    config.diversity.enabled = true;
    config.diversity.max_chunks_per_url = 1;
    let engine = fixtures::sample_engine(config).build().unwrap();

    let result = engine
        .search(SearchRequest::new("tokio async tasks channels", 5))
        .await
        .unwrap();

    let urls: Vec<&str> = result.candidates.iter().map(|c| c.url.as_str()).collect();
    let unique: HashSet<&str> = urls.iter().copied().collect();
    assert_eq!(urls.len(), unique.len(), "duplicate urls: {urls:?}");
}
