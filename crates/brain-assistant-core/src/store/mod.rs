//! Vector index abstraction for Brain Assistant.
//!
//! The [`VectorIndex`] trait is the only way the indexing pass and the
//! retrieval pipeline touch persisted embeddings. The reconciler never
//! writes to an index; the indexing pass stages its mutations in an
//! [`IndexBatch`] and hands the whole batch to [`VectorIndex::commit`].
//!
//! # Consistency contract
//!
//! - A committed batch is visible all at once. A concurrent
//!   [`query`](VectorIndex::query) or [`list_all`](VectorIndex::list_all)
//!   observes the state before the batch or after it, never a mix.
//! - A batch that fails validation or storage leaves the index unchanged.
//! - Paths are unique across entries after every commit.
//! - [`query`](VectorIndex::query) ranks by cosine similarity, highest
//!   first, ties broken by `index_id` ascending.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EntryMetadata, IndexedEntry, ScoredEntry};

/// An upsert waiting in an [`IndexBatch`].
///
/// `index_id == Some(id)` replaces the vector and metadata of `id` (or
/// inserts under `id` if it does not exist); `None` inserts under a fresh
/// UUID assigned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub index_id: Option<String>,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// Mutations staged during one indexing pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexBatch {
    pub upserts: Vec<PendingEntry>,
    pub deletes: Vec<String>,
}

impl IndexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_upsert(&mut self, entry: PendingEntry) {
        self.upserts.push(entry);
    }

    pub fn stage_delete(&mut self, index_id: impl Into<String>) {
        self.deletes.push(index_id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}

/// Abstract persistent vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_all`](VectorIndex::list_all) | Every entry, ordered by id |
/// | [`commit`](VectorIndex::commit) | Apply a staged batch atomically |
/// | [`query`](VectorIndex::query) | Top-k nearest entries |
/// | [`upsert`](VectorIndex::upsert) | Single-entry batch |
/// | [`delete_by_id`](VectorIndex::delete_by_id) | Single-delete batch |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// All entries, ordered by `index_id` ascending.
    async fn list_all(&self) -> Result<Vec<IndexedEntry>>;

    /// Apply every staged upsert and delete as one atomic update.
    ///
    /// Deletes are applied before upserts. Returns the id of each upsert in
    /// staging order. Deleting an unknown id is not an error.
    async fn commit(&self, batch: IndexBatch) -> Result<Vec<String>>;

    /// The `k` entries nearest to `vector`.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    async fn upsert(&self, entry: PendingEntry) -> Result<String> {
        let mut batch = IndexBatch::new();
        batch.stage_upsert(entry);
        let ids = self.commit(batch).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("commit returned no id for upsert"))
    }

    async fn delete_by_id(&self, index_id: &str) -> Result<()> {
        let mut batch = IndexBatch::new();
        batch.stage_delete(index_id);
        self.commit(batch).await?;
        Ok(())
    }
}

/// Reject vectors that do not have the index's dimensionality.
pub fn check_dims(batch: &IndexBatch, dims: usize) -> Result<()> {
    for entry in &batch.upserts {
        if entry.vector.len() != dims {
            anyhow::bail!(
                "vector for {} has {} dimensions, index expects {}",
                entry.metadata.path,
                entry.vector.len(),
                dims
            );
        }
    }
    Ok(())
}
