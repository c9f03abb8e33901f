//! Embedding and answer provider contract.
//!
//! The [`EmbeddingGateway`] trait is what the indexing pass and the
//! retrieval pipeline need from the remote model provider. The HTTP
//! implementation lives in the `brain-assistant` app crate; tests supply
//! scripted implementations.
//!
//! Failure semantics differ by call:
//!
//! | Call | On failure |
//! |------|------------|
//! | [`embed`](EmbeddingGateway::embed) | `Err(GatewayError)`, no vectors at all |
//! | [`embed_query`](EmbeddingGateway::embed_query) | `Err(GatewayError)` |
//! | [`answer`](EmbeddingGateway::answer) | the [`AnswerResponse::no_answer`] sentinel |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Answer text returned by [`AnswerResponse::no_answer`].
pub const NO_ANSWER_SENTINEL: &str = "no answer could be generated. Error in Request";

/// One supporting passage sent along with a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDocument {
    pub text: String,
}

/// A single generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// Provider response to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answers: Vec<Answer>,
}

impl AnswerResponse {
    /// Sentinel used when the answer call itself failed.
    pub fn no_answer() -> Self {
        Self {
            answers: vec![Answer {
                answer: NO_ANSWER_SENTINEL.to_string(),
            }],
        }
    }

    /// First non-blank answer, if any.
    pub fn first(&self) -> Option<&str> {
        self.answers
            .iter()
            .map(|a| a.answer.as_str())
            .find(|a| !a.trim().is_empty())
    }
}

#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embed a batch of texts with a single provider call.
    ///
    /// On success the result has exactly one vector of [`dims`](Self::dims)
    /// floats per input, in input order. An empty batch succeeds without
    /// contacting the provider.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GatewayError>;

    /// Ask the provider to answer `query` from `documents`. Never fails.
    async fn answer(&self, query: &str, documents: &[AnswerDocument]) -> AnswerResponse;

    /// Dimensionality of the vectors this gateway produces.
    fn dims(&self) -> usize;
}

/// Check that a provider returned one vector of `dims` floats per input.
pub fn validate_embeddings(
    endpoint: &str,
    expected: usize,
    dims: usize,
    vectors: &[Vec<f32>],
) -> Result<(), GatewayError> {
    if vectors.len() != expected {
        return Err(GatewayError::parse(
            endpoint,
            format!("expected {} embeddings, got {}", expected, vectors.len()),
        ));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
        return Err(GatewayError::parse(
            endpoint,
            format!("embedding {} has {} dimensions, expected {}", i, v.len(), dims),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_skips_blank_answers() {
        let resp = AnswerResponse {
            answers: vec![
                Answer { answer: "  ".into() },
                Answer { answer: "42".into() },
            ],
        };
        assert_eq!(resp.first(), Some("42"));
        assert_eq!(AnswerResponse { answers: vec![] }.first(), None);
    }

    #[test]
    fn test_validate_count_mismatch() {
        let err = validate_embeddings("/batch_semantic_embed", 2, 3, &[vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, GatewayError::Parse { .. }));
    }

    #[test]
    fn test_validate_dims_mismatch() {
        let err =
            validate_embeddings("/batch_semantic_embed", 2, 3, &[vec![0.0; 3], vec![0.0; 2]])
                .unwrap_err();
        assert!(err.to_string().contains("embedding 1 has 2 dimensions"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate_embeddings("/x", 1, 2, &[vec![1.0, 2.0]]).is_ok());
    }
}
