//! Composite ranking invariants over arbitrary pools.

use std::collections::BTreeMap;
use std::collections::HashSet;

use proptest::prelude::*;

use hybrank::corpus::{DocId, Document, DocumentStore};
use hybrank::search::composite::compare_candidates;
use hybrank::search::{CompositeScorer, FusedCandidate, ScoringStrategy};

fn arb_strategy() -> impl Strategy<Value = ScoringStrategy> {
    prop_oneof![
        Just(ScoringStrategy::Balanced),
        Just(ScoringStrategy::RerankHeavy),
        Just(ScoringStrategy::FusedOnly),
    ]
}

fn store_for(ids: &[DocId]) -> DocumentStore {
    let docs = ids
        .iter()
        .map(|&id| Document {
            id,
            title: format!("doc {id}"),
            url: format!("https://example.com/{id}"),
            snippet_source: String::new(),
            embedding: Vec::new(),
            term_weights: BTreeMap::new(),
            boost: 1.0,
        })
        .collect();
    DocumentStore::new(0, docs).unwrap()
}

proptest! {
    #[test]
    fn rerank_reorders_without_changing_membership(
        rows in prop::collection::vec((0.0f32..=1.0, 0.0f32..=1.0), 0..40),
        strategy in arb_strategy(),
    ) {
        let pool: Vec<FusedCandidate> = rows
            .iter()
            .enumerate()
            .map(|(i, (fused, _))| FusedCandidate {
                document_id: i as DocId,
                dense_score: None,
                sparse_score: None,
                fused_score: *fused,
            })
            .collect();
        let rerank: Vec<f32> = rows.iter().map(|(_, r)| *r).collect();
        let ids: Vec<DocId> = pool.iter().map(|c| c.document_id).collect();
        let store = store_for(&ids);

        let ranked = CompositeScorer::new(strategy).score(&pool, Some(&rerank), &store);

        prop_assert_eq!(ranked.len(), pool.len());
        let before: HashSet<DocId> = ids.into_iter().collect();
        let after: HashSet<DocId> = ranked.iter().map(|c| c.document_id).collect();
        prop_assert_eq!(before, after);

        for pair in ranked.windows(2) {
            prop_assert!(compare_candidates(&pair[0], &pair[1]).is_le());
        }
        for candidate in &ranked {
            prop_assert!(candidate.final_score.is_finite());
            prop_assert!(candidate.final_score >= 0.0 && candidate.final_score <= 1.0 + 1e-6);
        }
    }
}
