//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian `f32` BLOBs in the `entries` table
//! (see [`crate::migrate`]). Each [`commit`](VectorIndex::commit) runs in a
//! single transaction: deletes first, then upserts. The `UNIQUE(path)`
//! constraint rejects a batch that would give two entries the same path,
//! and the transaction rolls back.
//!
//! Similarity search loads every vector and ranks in process with
//! [`top_k`]; personal vaults are small enough that this stays cheap.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use brain_assistant_core::embedding::{blob_to_vec, top_k, vec_to_blob};
use brain_assistant_core::models::{EntryMetadata, IndexedEntry, ScoredEntry};
use brain_assistant_core::store::{check_dims, IndexBatch, VectorIndex};

use crate::{db, migrate};

/// One row of `brain status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub path: String,
    pub updated_at: i64,
}

pub struct SqliteIndex {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteIndex {
    /// Open the index file at `path`, creating the schema if needed.
    pub async fn open(path: &Path, dims: usize) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool, dims })
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Indexed paths with their last write time, ordered by path.
    pub async fn summaries(&self) -> Result<Vec<EntrySummary>> {
        let rows = sqlx::query("SELECT path, updated_at FROM entries ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(EntrySummary {
                    path: row.try_get("path")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn decode_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<IndexedEntry> {
        let index_id: String = row.try_get("id")?;
        let blob: Vec<u8> = row.try_get("vector")?;
        let dims: i64 = row.try_get("dims")?;
        let vector = blob_to_vec(&blob);
        if vector.len() as i64 != dims || vector.len() != self.dims {
            bail!(
                "entry {} holds a {}-dimension vector, index expects {}",
                index_id,
                vector.len(),
                self.dims
            );
        }

        Ok(IndexedEntry {
            index_id,
            vector,
            metadata: EntryMetadata {
                path: row.try_get("path")?,
                content_hash: row.try_get("content_hash")?,
            },
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn list_all(&self) -> Result<Vec<IndexedEntry>> {
        let rows = sqlx::query("SELECT id, path, content_hash, vector, dims FROM entries ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| self.decode_row(row)).collect()
    }

    async fn commit(&self, batch: IndexBatch) -> Result<Vec<String>> {
        check_dims(&batch, self.dims)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for id in &batch.deletes {
            sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let mut ids = Vec::with_capacity(batch.upserts.len());
        for pending in &batch.upserts {
            let id = pending
                .index_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            sqlx::query(
                r#"
                INSERT INTO entries (id, path, content_hash, vector, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    path = excluded.path,
                    content_hash = excluded.content_hash,
                    vector = excluded.vector,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&id)
            .bind(&pending.metadata.path)
            .bind(&pending.metadata.content_hash)
            .bind(vec_to_blob(&pending.vector))
            .bind(pending.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            ids.push(id);
        }

        tx.commit().await?;
        tracing::debug!(
            upserts = batch.upserts.len(),
            deletes = batch.deletes.len(),
            "sqlite index committed"
        );
        Ok(ids)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let entries = self.list_all().await?;
        Ok(top_k(entries, vector, k))
    }
}
