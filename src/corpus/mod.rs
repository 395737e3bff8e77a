//! Frozen document store and corpus snapshot loading
//!
//! The ingestion pipeline produces a JSON snapshot holding every chunk with
//! its precomputed embedding and term weights. Loading the snapshot yields
//! an immutable [`DocumentStore`] plus the two built-in indexes; either
//! index can come up unavailable without taking the other down.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HybrankError, Result};
use crate::search::dense::{DenseIndex, FlatDenseIndex};
use crate::search::sparse::{SparseIndex, TermWeightIndex};
use crate::search::{IndexHandle, IndexKind};

/// Stable document key.
pub type DocId = u64;

/// One indexed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub url: String,
    /// Text the reranker scores and snippets are cut from.
    pub snippet_source: String,
    /// L2-normalized at load time.
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub term_weights: BTreeMap<String, f32>,
    /// Multiplier applied to the final score.
    #[serde(default = "default_boost")]
    pub boost: f32,
}

const fn default_boost() -> f32 {
    1.0
}

/// On-disk snapshot layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    /// Embedding dimension shared by every document; 0 when the snapshot
    /// carries no embeddings.
    #[serde(default)]
    pub dims: usize,
    pub documents: Vec<Document>,
}

impl CorpusSnapshot {
    /// Read a snapshot from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            documents = snapshot.documents.len(),
            dims = snapshot.dims,
            "Loaded corpus snapshot"
        );
        Ok(snapshot)
    }
}

/// Immutable, id-addressable table of documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    positions: HashMap<DocId, usize>,
    dims: usize,
}

impl DocumentStore {
    /// Validate and freeze a set of documents.
    ///
    /// Rejects duplicate ids, non-finite values and non-positive boosts.
    /// Embeddings must either all match `dims` or all be empty; anything in
    /// between is reported by [`load_indexes`] as an unavailable dense index,
    /// not here.
    pub fn new(dims: usize, documents: Vec<Document>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(documents.len());
        let mut frozen = Vec::with_capacity(documents.len());

        for (position, mut doc) in documents.into_iter().enumerate() {
            if positions.insert(doc.id, position).is_some() {
                return Err(HybrankError::CorpusInvalid(format!(
                    "duplicate document id {}",
                    doc.id
                )));
            }
            if !doc.boost.is_finite() || doc.boost <= 0.0 {
                return Err(HybrankError::CorpusInvalid(format!(
                    "document {} has invalid boost {}",
                    doc.id, doc.boost
                )));
            }
            if doc.embedding.iter().any(|v| !v.is_finite()) {
                return Err(HybrankError::CorpusInvalid(format!(
                    "document {} has a non-finite embedding value",
                    doc.id
                )));
            }
            if doc.term_weights.values().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(HybrankError::CorpusInvalid(format!(
                    "document {} has a negative or non-finite term weight",
                    doc.id
                )));
            }
            l2_normalize(&mut doc.embedding);
            frozen.push(doc);
        }

        Ok(Self {
            documents: frozen,
            positions,
            dims,
        })
    }

    pub fn from_snapshot(snapshot: CorpusSnapshot) -> Result<Self> {
        Self::new(snapshot.dims, snapshot.documents)
    }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.positions.get(&id).map(|&pos| &self.documents[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embedding dimension declared by the snapshot.
    pub fn dims(&self) -> usize {
        self.dims
    }
}

/// Store plus the built-in dense and sparse indexes.
pub struct LoadedCorpus {
    pub store: Arc<DocumentStore>,
    pub dense: IndexHandle<dyn DenseIndex>,
    pub sparse: IndexHandle<dyn SparseIndex>,
}

/// Build the built-in indexes over a frozen store.
///
/// Each index is built independently; a failure is recorded on its handle
/// so the engine can report `IndexUnavailable` for that side only.
pub fn load_indexes(store: Arc<DocumentStore>) -> LoadedCorpus {
    let dense = match FlatDenseIndex::from_store(&store) {
        Ok(index) => IndexHandle::ready(Arc::new(index) as Arc<dyn DenseIndex>),
        Err(err) => {
            warn!(error = %err, "Dense index failed to load");
            IndexHandle::unavailable(IndexKind::Dense, err.to_string())
        }
    };
    let sparse = match TermWeightIndex::from_store(&store) {
        Ok(index) => IndexHandle::ready(Arc::new(index) as Arc<dyn SparseIndex>),
        Err(err) => {
            warn!(error = %err, "Sparse index failed to load");
            IndexHandle::unavailable(IndexKind::Sparse, err.to_string())
        }
    };

    LoadedCorpus {
        store,
        dense,
        sparse,
    }
}

/// Read a snapshot file, freeze it, and build both indexes.
pub fn load(path: impl AsRef<Path>) -> Result<LoadedCorpus> {
    let snapshot = CorpusSnapshot::from_path(path)?;
    let store = Arc::new(DocumentStore::from_snapshot(snapshot)?);
    Ok(load_indexes(store))
}

pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
