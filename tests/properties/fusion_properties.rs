//! Fusion invariants over arbitrary retrieval results.

use std::collections::HashSet;

use proptest::prelude::*;

use hybrank::corpus::DocId;
use hybrank::search::{FusionConfig, SearchMode, fuse, min_max_normalize};

/// Scores for documents `0..n`, each side keeping an arbitrary subset.
fn arb_hits() -> impl Strategy<Value = (Vec<(DocId, f32)>, Vec<(DocId, f32)>)> {
    prop::collection::vec(
        (
            prop::option::of(-10.0f32..10.0),
            prop::option::of(0.0f32..50.0),
        ),
        0..40,
    )
    .prop_map(|rows| {
        let mut dense = Vec::new();
        let mut sparse = Vec::new();
        for (id, (d, s)) in rows.into_iter().enumerate() {
            if let Some(d) = d {
                dense.push((id as DocId, d));
            }
            if let Some(s) = s {
                sparse.push((id as DocId, s));
            }
        }
        (dense, sparse)
    })
}

/// Dense score with frequent exact ties.
fn arb_dense_score() -> impl Strategy<Value = f32> {
    prop_oneof![-10.0f32..10.0, (0i32..4).prop_map(|v| v as f32)]
}

/// A dense-side result list with at least one hit, plus a sparse side that
/// may cover documents the dense side missed.
fn arb_dense_led_hits() -> impl Strategy<Value = (Vec<(DocId, f32)>, Vec<(DocId, f32)>)> {
    (
        arb_dense_score(),
        prop::option::of(0.0f32..50.0),
        prop::collection::vec(
            (prop::option::of(arb_dense_score()), prop::option::of(0.0f32..50.0)),
            0..30,
        ),
    )
        .prop_map(|(anchor, anchor_sparse, rows)| {
            let mut dense = vec![(0, anchor)];
            let mut sparse: Vec<(DocId, f32)> = anchor_sparse.map(|s| (0, s)).into_iter().collect();
            for (offset, (d, s)) in rows.into_iter().enumerate() {
                let id = offset as DocId + 1;
                if let Some(d) = d {
                    dense.push((id, d));
                }
                if let Some(s) = s {
                    sparse.push((id, s));
                }
            }
            (dense, sparse)
        })
}

/// Which dense hit gets its score raised.
#[derive(Debug, Clone, Copy)]
enum Raised {
    At(prop::sample::Index),
    Lowest,
    Highest,
}

impl Raised {
    fn position(self, dense: &[(DocId, f32)]) -> usize {
        let scored = dense.iter().enumerate();
        let pick = match self {
            Self::At(index) => return index.index(dense.len()),
            Self::Lowest => scored.min_by(|a, b| a.1.1.total_cmp(&b.1.1)),
            Self::Highest => scored.max_by(|a, b| a.1.1.total_cmp(&b.1.1)),
        };
        pick.map_or(0, |(i, _)| i)
    }
}

fn arb_raised() -> impl Strategy<Value = Raised> {
    prop_oneof![
        any::<prop::sample::Index>().prop_map(Raised::At),
        Just(Raised::Lowest),
        Just(Raised::Highest),
    ]
}

fn arb_delta() -> impl Strategy<Value = f32> {
    prop_oneof![Just(0.0f32), 0.0f32..5.0, 5.0f32..40.0]
}

fn fused_score_of(
    dense: &[(DocId, f32)],
    sparse: &[(DocId, f32)],
    mode: SearchMode,
    alpha: f32,
    id: DocId,
) -> f32 {
    fuse(dense, sparse, mode, &FusionConfig::with_alpha(alpha))
        .iter()
        .find(|c| c.document_id == id)
        .map(|c| c.fused_score)
        .unwrap()
}

fn arb_mode() -> impl Strategy<Value = SearchMode> {
    prop_oneof![
        Just(SearchMode::Dense),
        Just(SearchMode::Lexical),
        Just(SearchMode::Hybrid),
    ]
}

proptest! {
    #[test]
    fn normalized_scores_stay_in_unit_range(scores in prop::collection::vec(-1e6f32..1e6, 0..64)) {
        let normalized = min_max_normalize(&scores);
        prop_assert_eq!(normalized.len(), scores.len());
        for value in normalized {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn fused_output_is_bounded_unique_and_sorted(
        (dense, sparse) in arb_hits(),
        mode in arb_mode(),
        alpha in 0.0f32..=1.0,
    ) {
        let fused = fuse(&dense, &sparse, mode, &FusionConfig::with_alpha(alpha));

        let ids: HashSet<DocId> = fused.iter().map(|c| c.document_id).collect();
        prop_assert_eq!(ids.len(), fused.len());

        let mut expected: HashSet<DocId> = HashSet::new();
        if mode.uses_dense() {
            expected.extend(dense.iter().map(|(id, _)| *id));
        }
        if mode.uses_sparse() {
            expected.extend(sparse.iter().map(|(id, _)| *id));
        }
        prop_assert_eq!(ids, expected);

        for candidate in &fused {
            prop_assert!((0.0..=1.0).contains(&candidate.fused_score));
        }
        for pair in fused.windows(2) {
            prop_assert!(
                pair[0].fused_score > pair[1].fused_score
                    || (pair[0].fused_score == pair[1].fused_score
                        && pair[0].document_id < pair[1].document_id)
            );
        }
    }

    /// A document at least as good as another on both sides never fuses lower.
    #[test]
    fn hybrid_fusion_is_monotone(
        rows in prop::collection::vec((0.0f32..1.0, 0.0f32..20.0), 2..30),
        alpha in 0.0f32..=1.0,
    ) {
        let dense: Vec<(DocId, f32)> =
            rows.iter().enumerate().map(|(i, (d, _))| (i as DocId, *d)).collect();
        let sparse: Vec<(DocId, f32)> =
            rows.iter().enumerate().map(|(i, (_, s))| (i as DocId, *s)).collect();

        let fused = fuse(&dense, &sparse, SearchMode::Hybrid, &FusionConfig::with_alpha(alpha));
        let score_of = |id: DocId| {
            fused
                .iter()
                .find(|c| c.document_id == id)
                .map(|c| c.fused_score)
                .unwrap()
        };

        for (i, (di, si)) in rows.iter().enumerate() {
            for (j, (dj, sj)) in rows.iter().enumerate() {
                if di >= dj && si >= sj {
                    prop_assert!(score_of(i as DocId) + 1e-6 >= score_of(j as DocId));
                }
            }
        }
    }

    /// Raising one document's dense score never lowers its own fused score,
    /// whether it was the lowest, the highest or any other dense hit.
    #[test]
    fn raising_dense_score_never_lowers_fused_score(
        (dense, sparse) in arb_dense_led_hits(),
        raised in arb_raised(),
        delta in arb_delta(),
        alpha in 0.0f32..=1.0,
        hybrid in any::<bool>(),
    ) {
        let mode = if hybrid { SearchMode::Hybrid } else { SearchMode::Dense };
        let i = raised.position(&dense);
        let id = dense[i].0;

        let mut bumped = dense.clone();
        bumped[i].1 += delta;

        let before = fused_score_of(&dense, &sparse, mode, alpha, id);
        let after = fused_score_of(&bumped, &sparse, mode, alpha, id);
        prop_assert!(
            after + 1e-6 >= before,
            "doc {} fell from {} to {} after +{}", id, before, after, delta
        );
    }

    /// A lone dense hit normalizes to 1.0 however far its raw score moves.
    #[test]
    fn raising_the_only_dense_hit_keeps_its_fused_score(
        score in arb_dense_score(),
        delta in arb_delta(),
        sparse in prop::collection::vec(0.0f32..50.0, 0..10),
        alpha in 0.0f32..=1.0,
    ) {
        let sparse: Vec<(DocId, f32)> =
            sparse.into_iter().enumerate().map(|(i, s)| (i as DocId, s)).collect();
        let dense = vec![(0, score)];
        let bumped = vec![(0, score + delta)];

        let before = fused_score_of(&dense, &sparse, SearchMode::Hybrid, alpha, 0);
        let after = fused_score_of(&bumped, &sparse, SearchMode::Hybrid, alpha, 0);
        prop_assert!(after + 1e-6 >= before);
        prop_assert!((after - before).abs() < 1e-6);
    }
}
