//! Loading a snapshot from disk and querying it.

use std::collections::HashSet;

use hybrank::config::Config;
use hybrank::corpus::{self, CorpusSnapshot};
use hybrank::search::{HybridSearchEngine, SearchMode, SearchRequest};
use hybrank::test_utils::fixtures::write_sample_snapshot;
use tempfile::TempDir;

#[tokio::test]
async fn test_snapshot_round_trip_search() {
    let temp = TempDir::new().unwrap();
    let path = write_sample_snapshot(temp.path()).unwrap();

    let loaded = corpus::load(&path).unwrap();
    assert_eq!(loaded.store.len(), 8);
    assert!(loaded.dense.is_available());
    assert!(loaded.sparse.is_available());

    let engine = HybridSearchEngine::builder(Config::default())
        .corpus(loaded)
        .build()
        .unwrap();
    let result = engine
        .search(SearchRequest::new("borrow checker lifetimes", 5).mode(SearchMode::Lexical))
        .await
        .unwrap();

    let ids: HashSet<u64> = result.ids().into_iter().collect();
    assert_eq!(ids, HashSet::from([3, 4]));
}

#[test]
fn test_snapshot_with_duplicate_ids_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = write_sample_snapshot(temp.path()).unwrap();
    let mut snapshot = CorpusSnapshot::from_path(&path).unwrap();
    let duplicate = snapshot.documents[0].clone();
    snapshot.documents.push(duplicate);
    std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let err = corpus::load(&path).err().unwrap();
    assert!(err.to_string().contains("duplicate document id"));
}

#[test]
fn test_malformed_snapshot_is_a_json_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("corpus.json");
    std::fs::write(&path, "{\"documents\": [").unwrap();
    assert!(matches!(
        corpus::load(&path).err().unwrap(),
        hybrank::HybrankError::Json(_)
    ));
}
