//! Core data models shared by the scanner, reconciler, and vector index.
//!
//! A [`DocumentRecord`] is rebuilt on every scan pass; an [`IndexedEntry`]
//! is the durable record held by a [`VectorIndex`](crate::store::VectorIndex).
//! The two are matched by `path`.

use serde::{Deserialize, Serialize};

/// Dimensionality of every embedding stored in the index.
pub const EMBEDDING_DIMS: usize = 128;

/// One eligible note file as seen by the most recent scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Root-relative path with `/` separators. Unique within a scan.
    pub path: String,
    /// Cleaned text that is sent to the embedder.
    pub content: String,
    /// SHA-256 hex digest of the raw, uncleaned file bytes.
    pub content_hash: String,
    /// Id of the matching index entry; `None` until first indexed.
    pub index_id: Option<String>,
}

impl DocumentRecord {
    pub fn new(path: impl Into<String>, content: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            content_hash: content_hash.into(),
            index_id: None,
        }
    }
}

/// Metadata mirrored from a [`DocumentRecord`] at the time it was embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub path: String,
    pub content_hash: String,
}

/// A record currently held by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub index_id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// An [`IndexedEntry`] paired with its similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: IndexedEntry,
    pub score: f32,
}
