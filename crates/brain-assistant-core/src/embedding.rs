//! Vector utilities for stored embeddings.
//!
//! Pure helpers for BLOB (de)serialization of embeddings, the similarity
//! metric, and the ranking shared by every [`VectorIndex`](crate::store::VectorIndex)
//! implementation. The remote provider contract lives in [`gateway`](crate::gateway).

use std::cmp::Ordering;

use crate::models::{IndexedEntry, ScoredEntry};

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use brain_assistant_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![0.25f32, -1.0, 8.5];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing bytes that do not
/// form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Order two scored entries: higher score first, then `index_id` ascending.
///
/// `f32::total_cmp` keeps the order total even if a score is NaN.
pub fn rank_order(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.entry.index_id.cmp(&b.entry.index_id))
}

/// Score every entry against `query`, rank with [`rank_order`], keep `k`.
pub fn top_k<I>(entries: I, query: &[f32], k: usize) -> Vec<ScoredEntry>
where
    I: IntoIterator<Item = IndexedEntry>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .map(|entry| ScoredEntry {
            score: cosine_similarity(query, &entry.vector),
            entry,
        })
        .collect();
    scored.sort_by(rank_order);
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryMetadata;

    fn entry(id: &str, vector: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            index_id: id.to_string(),
            vector,
            metadata: EntryMetadata {
                path: format!("{}.md", id),
                content_hash: "h".to_string(),
            },
        }
    }

    #[test]
    fn test_blob_ignores_partial_tail() {
        let mut blob = vec_to_blob(&[1.5, 2.5]);
        blob.push(0xff);
        assert_eq!(blob_to_vec(&blob), vec![1.5, 2.5]);
    }

    #[test]
    fn test_cosine_parallel_and_opposite() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_top_k_nearest_first() {
        let entries = vec![
            entry("far", vec![0.0, 1.0]),
            entry("near", vec![1.0, 0.1]),
            entry("mid", vec![1.0, 1.0]),
        ];
        let ranked = top_k(entries, &[1.0, 0.0], 2);
        let ids: Vec<&str> = ranked.iter().map(|s| s.entry.index_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[test]
    fn test_top_k_ties_break_on_id() {
        let entries = vec![
            entry("c", vec![1.0, 0.0]),
            entry("a", vec![2.0, 0.0]),
            entry("b", vec![3.0, 0.0]),
        ];
        let ranked = top_k(entries, &[1.0, 0.0], 3);
        let ids: Vec<&str> = ranked.iter().map(|s| s.entry.index_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_top_k_zero() {
        assert!(top_k(vec![entry("a", vec![1.0])], &[1.0], 0).is_empty());
    }
}
