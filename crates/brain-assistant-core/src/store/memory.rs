//! In-memory [`VectorIndex`] implementation for tests and ephemeral use.
//!
//! Entries live in a `BTreeMap` keyed by id behind a `std::sync::RwLock`.
//! A commit builds the next map on a copy and swaps it in while holding the
//! write lock, so readers see either the old or the new map.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::top_k;
use crate::models::{IndexedEntry, ScoredEntry};

use super::{check_dims, IndexBatch, VectorIndex};

/// In-memory vector index.
pub struct InMemoryIndex {
    dims: usize,
    entries: RwLock<BTreeMap<String, IndexedEntry>>,
}

impl InMemoryIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, IndexedEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(crate::models::EMBEDDING_DIMS)
    }
}

/// Apply `batch` to `entries` in place, returning the upserted ids.
fn apply(entries: &mut BTreeMap<String, IndexedEntry>, batch: IndexBatch) -> Result<Vec<String>> {
    for id in &batch.deletes {
        entries.remove(id);
    }

    let mut ids = Vec::with_capacity(batch.upserts.len());
    for pending in batch.upserts {
        let id = pending
            .index_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        entries.insert(
            id.clone(),
            IndexedEntry {
                index_id: id.clone(),
                vector: pending.vector,
                metadata: pending.metadata,
            },
        );
        ids.push(id);
    }

    let mut owners: HashMap<&str, &str> = HashMap::with_capacity(entries.len());
    for entry in entries.values() {
        if let Some(other) = owners.insert(entry.metadata.path.as_str(), entry.index_id.as_str()) {
            bail!(
                "path {} would be held by both {} and {}",
                entry.metadata.path,
                other,
                entry.index_id
            );
        }
    }

    Ok(ids)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_all(&self) -> Result<Vec<IndexedEntry>> {
        Ok(self.read().values().cloned().collect())
    }

    async fn commit(&self, batch: IndexBatch) -> Result<Vec<String>> {
        check_dims(&batch, self.dims)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.clone();
        let ids = apply(&mut next, batch)?;
        *guard = next;

        tracing::debug!(entries = guard.len(), "in-memory index committed");
        Ok(ids)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let snapshot: Vec<IndexedEntry> = self.read().values().cloned().collect();
        Ok(top_k(snapshot, vector, k))
    }
}
