//! HTTP implementation of the [`EmbeddingGateway`] against the Aleph Alpha API.
//!
//! # Endpoints
//!
//! | Method | Path | Used for |
//! |--------|------|----------|
//! | `POST` | `/batch_semantic_embed` | [`embed`](EmbeddingGateway::embed) |
//! | `POST` | `/semantic_embed` | [`embed_query`](EmbeddingGateway::embed_query) |
//! | `POST` | `/qa` | [`answer`](EmbeddingGateway::answer) |
//! | `GET`  | `/users/me/requests` | [`AlephAlphaGateway::request_log`] |
//!
//! Every request carries `Authorization: Bearer <token>` and is bounded by
//! `provider.timeout_secs`. Responses are deserialized into explicit structs;
//! anything that does not match is a [`GatewayError::Parse`].
//!
//! # Retry Strategy
//!
//! Nothing is retried unless `provider.max_retries > 0`. When enabled:
//! - HTTP 429 and 5xx → retry
//! - transport errors (including timeouts) → retry
//! - other 4xx and parse errors → fail immediately
//! - backoff: 1s, 2s, 4s, … (capped at 2^5)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use brain_assistant_core::error::GatewayError;
use brain_assistant_core::gateway::{
    validate_embeddings, AnswerDocument, AnswerResponse, EmbeddingGateway,
};
use brain_assistant_core::models::EMBEDDING_DIMS;

use crate::budget::UsageLog;
use crate::config::ProviderConfig;

const BATCH_EMBED: &str = "/batch_semantic_embed";
const SEMANTIC_EMBED: &str = "/semantic_embed";
const QA: &str = "/qa";
const REQUEST_LOG: &str = "/users/me/requests";

const REPRESENTATION: &str = "symmetric";

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    prompts: &'a [String],
    representation: &'a str,
    compress_to_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    representation: &'a str,
    compress_to_size: usize,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct QaRequest<'a> {
    query: &'a str,
    documents: &'a [AnswerDocument],
}

/// Gateway to the Aleph Alpha HTTP API.
pub struct AlephAlphaGateway {
    client: reqwest::Client,
    base_url: String,
    model: String,
    token: String,
    max_retries: u32,
}

impl AlephAlphaGateway {
    /// Build a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Fails if no token is configured or the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let token = config.resolve_token()?;
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            token,
            max_retries: config.max_retries,
        })
    }

    /// Recent usage log entries for the authenticated user.
    pub async fn request_log(&self) -> Result<Vec<UsageLog>, GatewayError> {
        self.send_with_retry(REQUEST_LOG, || self.client.get(self.url(REQUEST_LOG)))
            .await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_with_retry(endpoint, || {
            self.client
                .post(self.url(endpoint))
                .header("Content-Type", "application/json")
                .json(body)
        })
        .await
    }

    async fn send_with_retry<F, T>(&self, endpoint: &str, build: F) -> Result<T, GatewayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
        T: DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.send_once(endpoint, build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(endpoint, attempt, error = %e, "provider call failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .header("Accept", "application/json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GatewayError::transport(endpoint, describe_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::transport(endpoint, describe_transport(&e)))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::parse(endpoint, e.to_string()))
    }
}

fn describe_transport(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[async_trait]
impl EmbeddingGateway for AlephAlphaGateway {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedRequest {
            model: &self.model,
            prompts: texts,
            representation: REPRESENTATION,
            compress_to_size: EMBEDDING_DIMS,
        };
        let response: BatchEmbedResponse = self.post_json(BATCH_EMBED, &request).await?;
        validate_embeddings(BATCH_EMBED, texts.len(), EMBEDDING_DIMS, &response.embeddings)?;
        Ok(response.embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
            representation: REPRESENTATION,
            compress_to_size: EMBEDDING_DIMS,
        };
        let response: EmbedResponse = self.post_json(SEMANTIC_EMBED, &request).await?;
        let vectors = [response.embedding];
        validate_embeddings(SEMANTIC_EMBED, 1, EMBEDDING_DIMS, &vectors)?;
        let [embedding] = vectors;
        Ok(embedding)
    }

    async fn answer(&self, query: &str, documents: &[AnswerDocument]) -> AnswerResponse {
        let request = QaRequest { query, documents };
        match self.post_json::<_, AnswerResponse>(QA, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "answer generation failed");
                AnswerResponse::no_answer()
            }
        }
    }

    fn dims(&self) -> usize {
        EMBEDDING_DIMS
    }
}
