//! One incremental indexing pass.
//!
//! ```text
//! scan vault ──► list index ──► reconcile ──► embed (batched) ──► commit
//! ```
//!
//! The pass stages every mutation in a single [`IndexBatch`] and commits it
//! only after all embeddings succeeded. Any failure before the commit leaves
//! the index exactly as it was; the next pass recomputes the diff from
//! scratch and retries.
//!
//! A note that is on disk but could not be read keeps its entry: deletions
//! are only staged for paths that are really gone.

use serde::Serialize;
use std::collections::HashSet;
use std::io;
use thiserror::Error;

use brain_assistant_core::error::{ConsistencyViolation, FilesystemError, GatewayError};
use brain_assistant_core::gateway::{validate_embeddings, EmbeddingGateway};
use brain_assistant_core::models::{EntryMetadata, IndexedEntry};
use brain_assistant_core::reconcile::{reconcile, ReconcilePlan};
use brain_assistant_core::store::{IndexBatch, PendingEntry, VectorIndex};

use crate::config::VaultConfig;
use crate::scanner::{scan_vault, ScanReport};

/// Text embedded in place of a note whose cleaned content is blank.
pub const EMPTY_PLACEHOLDER: &str = "EMPTY";

#[derive(Debug, Error)]
pub enum IndexError {
    /// The vault root could not be read.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyViolation),

    /// An embedding batch failed; `paths` lists the notes in that batch.
    #[error("embedding failed for a batch of {} note(s): {source}", .paths.len())]
    Embedding {
        paths: Vec<String>,
        #[source]
        source: GatewayError,
    },

    #[error("vector index error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Counters describing a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub scanned: usize,
    pub unchanged: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Files skipped because they could not be read.
    pub skipped_files: usize,
}

impl IndexStats {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.deleted > 0
    }
}

/// Bring `index` in line with the notes under `vault.root`.
pub async fn run_index_pass(
    vault: &VaultConfig,
    gateway: &dyn EmbeddingGateway,
    index: &dyn VectorIndex,
    batch_size: usize,
) -> Result<IndexStats, IndexError> {
    let mut report = scan_in_background(vault).await?;
    if let Some(err) = report.root_error.take() {
        return Err(IndexError::Filesystem(err));
    }

    let failed = report.failed_paths(&vault.root);
    let indexed = index.list_all().await.map_err(IndexError::Store)?;
    let scanned = report.documents.len();
    let skipped_files = report.errors.len();
    let mut plan = reconcile(report.documents, &indexed)?;

    let kept = keep_unreadable(&mut plan, &indexed, &failed);
    if kept > 0 {
        tracing::warn!(kept, "keeping index entries of notes that could not be read");
    }

    let stats = IndexStats {
        scanned,
        unchanged: plan.unchanged.len(),
        added: plan.added(),
        updated: plan.updated(),
        deleted: plan.to_delete.len(),
        skipped_files,
    };

    if plan.is_empty() {
        tracing::debug!(scanned, "index is up to date");
        return Ok(stats);
    }

    let mut batch = IndexBatch::new();
    for id in &plan.to_delete {
        batch.stage_delete(id.clone());
    }

    for chunk in plan.to_embed.chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk
            .iter()
            .map(|doc| {
                if doc.content.trim().is_empty() {
                    EMPTY_PLACEHOLDER.to_string()
                } else {
                    doc.content.clone()
                }
            })
            .collect();

        let embed_failed = |source: GatewayError| IndexError::Embedding {
            paths: chunk.iter().map(|d| d.path.clone()).collect(),
            source,
        };
        let vectors = gateway.embed(&texts).await.map_err(embed_failed)?;
        validate_embeddings("embed", chunk.len(), gateway.dims(), &vectors).map_err(embed_failed)?;

        for (doc, vector) in chunk.iter().zip(vectors) {
            batch.stage_upsert(PendingEntry {
                index_id: doc.index_id.clone(),
                vector,
                metadata: EntryMetadata {
                    path: doc.path.clone(),
                    content_hash: doc.content_hash.clone(),
                },
            });
        }
        tracing::debug!(notes = chunk.len(), "embedded batch");
    }

    index.commit(batch).await.map_err(IndexError::Store)?;

    tracing::info!(
        scanned = stats.scanned,
        added = stats.added,
        updated = stats.updated,
        deleted = stats.deleted,
        unchanged = stats.unchanged,
        skipped = stats.skipped_files,
        "index pass committed"
    );
    Ok(stats)
}

/// Remove from `plan.to_delete` every entry whose path is, or lies under, a
/// path the scan failed to read. Returns how many deletions were dropped.
fn keep_unreadable(plan: &mut ReconcilePlan, indexed: &[IndexedEntry], failed: &[String]) -> usize {
    if failed.is_empty() {
        return 0;
    }
    let protected: HashSet<&str> = indexed
        .iter()
        .filter(|entry| failed.iter().any(|f| is_within(&entry.metadata.path, f)))
        .map(|entry| entry.index_id.as_str())
        .collect();

    let before = plan.to_delete.len();
    plan.to_delete.retain(|id| !protected.contains(id.as_str()));
    before - plan.to_delete.len()
}

fn is_within(path: &str, failed: &str) -> bool {
    failed.is_empty()
        || path == failed
        || path
            .strip_prefix(failed)
            .is_some_and(|rest| rest.starts_with('/'))
}

async fn scan_in_background(vault: &VaultConfig) -> Result<ScanReport, IndexError> {
    let vault = vault.clone();
    let root = vault.root.clone();
    let joined = tokio::task::spawn_blocking(move || scan_vault(&vault)).await;

    let as_fs_error = |message: String| {
        IndexError::Filesystem(FilesystemError::new(
            root.clone(),
            io::Error::new(io::ErrorKind::Other, message),
        ))
    };
    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(as_fs_error(format!("{:#}", e))),
        Err(e) => Err(as_fs_error(format!("scan task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brain_assistant_core::gateway::AnswerDocument;
    use brain_assistant_core::gateway::AnswerResponse;
    use brain_assistant_core::store::memory::InMemoryIndex;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every embed call and returns constant vectors.
    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl EmbeddingGateway for RecordingGateway {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
            self.calls.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, GatewayError> {
            Ok(vec![1.0, 0.0])
        }
        async fn answer(&self, _q: &str, _d: &[AnswerDocument]) -> AnswerResponse {
            AnswerResponse::no_answer()
        }
        fn dims(&self) -> usize {
            2
        }
    }

    fn vault(root: &std::path::Path) -> VaultConfig {
        VaultConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".into()],
            exclude_dirs: vec![".obsidian".into()],
            follow_symlinks: true,
        }
    }

    #[tokio::test]
    async fn test_blank_note_sends_placeholder() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blank.md"), "").unwrap();
        std::fs::write(tmp.path().join("punct.md"), "#*_").unwrap();

        let gateway = RecordingGateway::default();
        let index = InMemoryIndex::new(2);
        run_index_pass(&vault(tmp.path()), &gateway, &index, 8)
            .await
            .unwrap();

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![EMPTY_PLACEHOLDER, EMPTY_PLACEHOLDER]);
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            std::fs::write(tmp.path().join(format!("n{}.md", i)), format!("note {}", i)).unwrap();
        }

        let gateway = RecordingGateway::default();
        let index = InMemoryIndex::new(2);
        let stats = run_index_pass(&vault(tmp.path()), &gateway, &index, 2)
            .await
            .unwrap();

        let sizes: Vec<usize> = gateway.calls.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(stats.added, 5);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("a.md", "a.md"));
        assert!(is_within("sub/deep/a.md", "sub"));
        assert!(is_within("anything.md", ""));
        assert!(!is_within("subway.md", "sub"));
        assert!(!is_within("b.md", "a.md"));
    }

    #[tokio::test]
    async fn test_missing_root_aborts_without_deleting() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();
        let gateway = RecordingGateway::default();
        let index = InMemoryIndex::new(2);
        run_index_pass(&vault(tmp.path()), &gateway, &index, 8)
            .await
            .unwrap();

        let gone = vault(&tmp.path().join("missing"));
        let err = run_index_pass(&gone, &gateway, &index, 8).await.unwrap_err();
        assert!(matches!(err, IndexError::Filesystem(_)));
        assert_eq!(index.len(), 1);
    }
}
