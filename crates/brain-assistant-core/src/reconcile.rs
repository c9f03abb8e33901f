//! Change reconciliation between a scan and the vector index.
//!
//! [`reconcile`] compares the documents found by the latest scan with the
//! entries currently held by the index and computes the minimal set of
//! mutations that brings the index back in line with the disk.
//!
//! # Algorithm
//!
//! 1. Build a lookup from indexed path to `(index_id, content_hash)`.
//! 2. Every indexed path missing from the scan is scheduled for deletion.
//! 3. A scanned path with an indexed match is re-embedded under the existing
//!    id when the hashes differ, and skipped when they are equal.
//! 4. A scanned path with no match is new and is embedded without an id.
//!
//! Running reconcile again after the resulting plan has been committed
//! produces an empty plan.

use std::collections::{BTreeMap, HashSet};

use crate::error::ConsistencyViolation;
use crate::models::{DocumentRecord, IndexedEntry};

/// The mutations needed to make the index match the latest scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// New documents (`index_id == None`) and updated documents (carrying the
    /// id of the entry they replace), in scan order.
    pub to_embed: Vec<DocumentRecord>,
    /// Ids of entries whose path is gone from disk, ascending.
    pub to_delete: Vec<String>,
    /// Paths whose hash matched the index and need no work.
    pub unchanged: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_embed.is_empty() && self.to_delete.is_empty()
    }

    pub fn added(&self) -> usize {
        self.to_embed.iter().filter(|d| d.index_id.is_none()).count()
    }

    pub fn updated(&self) -> usize {
        self.to_embed.iter().filter(|d| d.index_id.is_some()).count()
    }
}

/// Classify every scanned document as new, updated, or unchanged, and every
/// vanished index entry as deleted.
///
/// # Errors
///
/// Returns [`ConsistencyViolation`] when a path occurs twice in `current` or
/// twice in `indexed`. Both are caller bugs; nothing is classified.
pub fn reconcile(
    current: Vec<DocumentRecord>,
    indexed: &[IndexedEntry],
) -> Result<ReconcilePlan, ConsistencyViolation> {
    let mut seen = HashSet::with_capacity(current.len());
    for doc in &current {
        if !seen.insert(doc.path.as_str()) {
            return Err(ConsistencyViolation::DuplicatePath(doc.path.clone()));
        }
    }

    let mut lookup: BTreeMap<&str, (&str, &str)> = BTreeMap::new();
    for entry in indexed {
        let previous = lookup.insert(
            entry.metadata.path.as_str(),
            (entry.index_id.as_str(), entry.metadata.content_hash.as_str()),
        );
        if previous.is_some() {
            return Err(ConsistencyViolation::DuplicateIndexedPath(
                entry.metadata.path.clone(),
            ));
        }
    }

    let mut to_delete: Vec<String> = lookup
        .iter()
        .filter(|(path, _)| !seen.contains(*path))
        .map(|(_, (id, _))| id.to_string())
        .collect();
    to_delete.sort();

    let mut to_embed = Vec::new();
    let mut unchanged = Vec::new();

    for mut doc in current {
        match lookup.get(doc.path.as_str()) {
            Some((_, hash)) if *hash == doc.content_hash => unchanged.push(doc.path),
            Some((id, _)) => {
                doc.index_id = Some(id.to_string());
                to_embed.push(doc);
            }
            None => {
                doc.index_id = None;
                to_embed.push(doc);
            }
        }
    }

    Ok(ReconcilePlan {
        to_embed,
        to_delete,
        unchanged,
    })
}
