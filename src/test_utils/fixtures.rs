use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::corpus::{CorpusSnapshot, DocId, Document, DocumentStore, LoadedCorpus, load_indexes};
use crate::search::dense::DenseIndex;
use crate::search::embeddings::HashEmbedder;
use crate::search::engine::HybridSearchEngineBuilder;
use crate::search::sparse::SparseIndex;
use crate::search::text::{term_counts, tokenize};
use crate::search::IndexHandle;
use crate::test_utils::doubles::{StaticDenseIndex, StaticSparseIndex};

/// Embedding width of the fixture corpora.
pub const FIXTURE_DIMS: usize = 64;

/// Ids of the three documents in [`scenario_corpus`].
pub const DOC_A: DocId = 1;
pub const DOC_B: DocId = 2;
pub const DOC_C: DocId = 3;

/// A document whose embedding and term weights are derived from its text.
pub fn document(id: DocId, title: &str, url: &str, text: &str) -> Document {
    let tokens = tokenize(&format!("{title} {text}"));
    let total = tokens.len().max(1) as f32;
    let term_weights: BTreeMap<String, f32> = term_counts(&tokens)
        .into_iter()
        .map(|(term, count)| (term.to_string(), count / total))
        .collect();

    Document {
        id,
        title: title.to_string(),
        url: url.to_string(),
        snippet_source: text.to_string(),
        embedding: HashEmbedder::new(FIXTURE_DIMS).embed_text(&format!("{title} {text}")),
        term_weights,
        boost: 1.0,
    }
}

/// Eight short chunks about Rust tooling. Documents 1 and 8 share a URL.
pub fn sample_documents() -> Vec<Document> {
    vec![
        document(
            1,
            "Tokio runtime internals",
            "https://docs.example.com/tokio",
            "The tokio runtime schedules async tasks on a work-stealing thread pool.",
        ),
        document(
            2,
            "Async cancellation",
            "https://docs.example.com/cancellation",
            "Dropping a future cancels it, while async tasks spawned on tokio keep running.",
        ),
        document(
            3,
            "The borrow checker",
            "https://docs.example.com/borrowck",
            "The borrow checker enforces ownership and lifetimes at compile time.",
        ),
        document(
            4,
            "Lifetimes explained",
            "https://docs.example.com/lifetimes",
            "Lifetimes describe how long references stay valid for the borrow checker.",
        ),
        document(
            5,
            "Rayon parallelism",
            "https://docs.example.com/rayon",
            "Rayon turns sequential iterators into parallel iterators with work stealing.",
        ),
        document(
            6,
            "Serde derive",
            "https://docs.example.com/serde",
            "Serde derives serialization and deserialization for structs and enums.",
        ),
        document(
            7,
            "Error handling with thiserror",
            "https://docs.example.com/errors",
            "The thiserror crate derives std error implementations for error enums.",
        ),
        document(
            8,
            "Channels in tokio",
            "https://docs.example.com/tokio",
            "Tokio provides mpsc, oneshot, broadcast and watch channels for async tasks.",
        ),
    ]
}

pub fn sample_store() -> Arc<DocumentStore> {
    match DocumentStore::new(FIXTURE_DIMS, sample_documents()) {
        Ok(store) => Arc::new(store),
        Err(err) => panic!("sample corpus is invalid: {err}"),
    }
}

/// Sample store with both built-in indexes.
pub fn sample_corpus() -> LoadedCorpus {
    load_indexes(sample_store())
}

/// Engine builder over the sample corpus with the hash embedder.
pub fn sample_engine(config: Config) -> HybridSearchEngineBuilder {
    HybridSearchEngineBuilder::new(config)
        .corpus(sample_corpus())
        .embedder(Arc::new(HashEmbedder::new(FIXTURE_DIMS)))
}

/// Write the sample corpus as a snapshot file inside `dir`.
pub fn write_sample_snapshot(dir: &Path) -> std::io::Result<PathBuf> {
    let snapshot = CorpusSnapshot {
        dims: FIXTURE_DIMS,
        documents: sample_documents(),
    };
    let path = dir.join("corpus.json");
    let json = serde_json::to_string_pretty(&snapshot).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Three documents with fixed retrieval scores, whatever the query:
///
/// | doc | dense | sparse |
/// |-----|-------|--------|
/// | A   | 0.9   | 0.1    |
/// | B   | 0.4   | 0.9    |
/// | C   | 0.0   | -      |
pub fn scenario_corpus() -> LoadedCorpus {
    let docs = vec![
        document(DOC_A, "A", "https://example.com/a", "alpha document"),
        document(DOC_B, "B", "https://example.com/b", "bravo document"),
        document(DOC_C, "C", "https://example.com/c", "charlie document"),
    ];
    let store = match DocumentStore::new(FIXTURE_DIMS, docs) {
        Ok(store) => Arc::new(store),
        Err(err) => panic!("scenario corpus is invalid: {err}"),
    };

    let dense: Arc<dyn DenseIndex> = Arc::new(StaticDenseIndex::new(
        FIXTURE_DIMS,
        vec![(DOC_A, 0.9), (DOC_B, 0.4), (DOC_C, 0.0)],
    ));
    let sparse: Arc<dyn SparseIndex> =
        Arc::new(StaticSparseIndex::new(vec![(DOC_B, 0.9), (DOC_A, 0.1)]));

    LoadedCorpus {
        store,
        dense: IndexHandle::ready(dense),
        sparse: IndexHandle::ready(sparse),
    }
}

/// Config for the scenario: alpha 0.5, everything else default.
pub fn scenario_config() -> Config {
    let mut config = Config::default();
    config.search.alpha = 0.5;
    config
}
