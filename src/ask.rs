//! Retrieval and answer pipeline.
//!
//! ```text
//! query ─► embed_query ─► top-3 entries ─► load + clean notes ─► /qa ─► answer
//! ```
//!
//! Provider failures never surface as errors here: they are logged and the
//! caller gets [`FALLBACK_ANSWER`]. Only a failing vector index is an `Err`.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use brain_assistant_core::gateway::{AnswerDocument, EmbeddingGateway, NO_ANSWER_SENTINEL};
use brain_assistant_core::store::VectorIndex;

use crate::scanner::load_sources;

/// Number of notes retrieved as context for an answer.
pub const TOP_K: usize = 3;

/// Answer text shown whenever no answer could be produced.
pub const FALLBACK_ANSWER: &str = NO_ANSWER_SENTINEL;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// Vault-relative paths of the notes the answer was generated from, best match first.
    pub sources: Vec<String>,
}

impl QueryAnswer {
    pub fn fallback() -> Self {
        Self {
            answer: FALLBACK_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.answer == FALLBACK_ANSWER
    }
}

/// Answer `query` from the notes nearest to it.
pub async fn answer_query(
    gateway: &dyn EmbeddingGateway,
    index: &dyn VectorIndex,
    vault_root: &Path,
    query: &str,
) -> Result<QueryAnswer> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(QueryAnswer::fallback());
    }

    let vector = match gateway.embed_query(query).await {
        Ok(vector) => vector,
        Err(e) => {
            tracing::error!(error = %e, "query embedding failed");
            return Ok(QueryAnswer::fallback());
        }
    };

    let hits = index.query(&vector, TOP_K).await?;
    if hits.is_empty() {
        tracing::info!("index is empty; nothing to answer from");
        return Ok(QueryAnswer::fallback());
    }

    let paths: Vec<String> = hits.into_iter().map(|hit| hit.entry.metadata.path).collect();
    let loaded = load_sources(vault_root, &paths).await;
    if loaded.is_empty() {
        tracing::warn!(?paths, "none of the retrieved notes could be loaded");
        return Ok(QueryAnswer::fallback());
    }

    let documents: Vec<AnswerDocument> = loaded
        .iter()
        .map(|source| AnswerDocument {
            text: source.text.clone(),
        })
        .collect();
    let response = gateway.answer(query, &documents).await;

    let answer = response.first().unwrap_or(FALLBACK_ANSWER).to_string();
    Ok(QueryAnswer {
        answer,
        sources: loaded.into_iter().map(|source| source.path).collect(),
    })
}
