//! Retrieval evaluation over the sample corpus.

use hybrank::config::Config;
use hybrank::search::{EvalOptions, EvalSet, SearchMode, evaluate};
use hybrank::test_utils::fixtures;

const EVAL_SET: &str = r#"
{"q": "serde serialization", "gold_urls": ["https://docs.example.com/serde"]}
{"q": "rayon parallel iterators", "gold_urls": ["https://docs.example.com/rayon"]}
{"q": "borrow checker", "gold_urls": ["https://docs.example.com/borrowck", "https://docs.example.com/lifetimes"]}
{"q": "kubernetes helm", "gold_urls": ["https://docs.example.com/k8s"]}
"#;

fn options(mode: SearchMode) -> EvalOptions {
    EvalOptions {
        k: 3,
        mode,
        ..EvalOptions::default()
    }
}

#[tokio::test]
async fn test_lexical_eval_scores_each_query() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let set = EvalSet::parse(EVAL_SET).unwrap();
    assert_eq!(set.len(), 4);

    let report = evaluate(&engine, &set, options(SearchMode::Lexical))
        .await
        .unwrap();

    assert_eq!(report.queries, 4);
    assert_eq!(report.k, 3);
    let rr: Vec<f64> = report.per_query.iter().map(|q| q.reciprocal_rank).collect();
    assert_eq!(rr, vec![1.0, 1.0, 1.0, 0.0]);
    assert_eq!(report.per_query[2].relevant, 2);
    assert_eq!(report.per_query[3].retrieved, 0);

    assert!((report.recall - 0.75).abs() < 1e-9);
    assert!((report.mrr - 0.75).abs() < 1e-9);
    assert!((report.ndcg - 0.75).abs() < 1e-9);
    assert_eq!(
        report.to_string(),
        "mode=lexical k=3 N=4 | R@3=0.750 MRR=0.750 nDCG@3=0.750"
    );
}

#[tokio::test]
async fn test_eval_metrics_stay_in_unit_range_for_every_mode() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let set = EvalSet::parse(EVAL_SET).unwrap();

    for mode in SearchMode::ALL {
        let report = evaluate(&engine, &set, options(mode)).await.unwrap();
        assert_eq!(report.mode, mode);
        assert_eq!(report.per_query.len(), 4);
        for value in [report.recall, report.mrr, report.ndcg] {
            assert!((0.0..=1.0).contains(&value), "{mode}: {value}");
        }
        assert!(report.per_query.iter().all(|q| q.retrieved <= 3));
    }
}

#[tokio::test]
async fn test_repeated_eval_is_served_from_cache() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let set = EvalSet::parse(EVAL_SET).unwrap();

    let first = evaluate(&engine, &set, options(SearchMode::Hybrid)).await.unwrap();
    let second = evaluate(&engine, &set, options(SearchMode::Hybrid)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.cache_stats().hits, 4);
}

#[tokio::test]
async fn test_empty_eval_set_reports_zeroes() {
    let engine = fixtures::sample_engine(Config::default()).build().unwrap();
    let report = evaluate(&engine, &EvalSet::default(), options(SearchMode::Hybrid))
        .await
        .unwrap();
    assert_eq!(report.queries, 0);
    assert_eq!(report.recall, 0.0);
    assert_eq!(report.mrr, 0.0);
}
