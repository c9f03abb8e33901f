//! HTTP front end for asking questions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ask` | Answer `{ "query": "..." }` from the vault |
//! | `POST` | `/reindex` | Queue an indexing pass, returns 202 |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-based chat
//! panel can talk to a local instance.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use brain_assistant_core::gateway::EmbeddingGateway;
use brain_assistant_core::models::EMBEDDING_DIMS;
use brain_assistant_core::store::VectorIndex;

use crate::ask::{answer_query, QueryAnswer};
use crate::config::Config;
use crate::gateway::AlephAlphaGateway;
use crate::sqlite_index::SqliteIndex;
use crate::watch::{watch_vault, IndexWorker, PassContext};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn EmbeddingGateway>,
    pub index: Arc<dyn VectorIndex>,
    pub vault_root: Arc<PathBuf>,
    pub worker: IndexWorker,
}

/// Build the router. Separate from [`run_server`] so tests can drive it directly.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/reindex", post(handle_reindex))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` with a background watcher keeping the index fresh.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let gateway: Arc<dyn EmbeddingGateway> = Arc::new(AlephAlphaGateway::new(&config.provider)?);
    let index: Arc<dyn VectorIndex> =
        Arc::new(SqliteIndex::open(&config.index.path, EMBEDDING_DIMS).await?);

    let worker = IndexWorker::spawn(
        PassContext {
            vault: config.vault.clone(),
            gateway: gateway.clone(),
            index: index.clone(),
            batch_size: config.index.batch_size,
        },
        config.watch.debounce(),
    );
    let _watcher = watch_vault(&config.vault, worker.clone())?;
    worker.trigger("startup").await?;

    let app = router(AppState {
        gateway,
        index,
        vault_root: Arc::new(config.vault.root.clone()),
        worker: worker.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Brain Assistant listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    worker.shutdown().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "unavailable",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    query: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<QueryAnswer>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let answer = answer_query(
        state.gateway.as_ref(),
        state.index.as_ref(),
        &state.vault_root,
        &req.query,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "ask failed");
        internal(format!("{:#}", e))
    })?;

    Ok(Json(answer))
}

// ============ POST /reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    queued: bool,
}

async fn handle_reindex(State(state): State<AppState>) -> Result<Response, AppError> {
    state
        .worker
        .trigger("http")
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(ReindexResponse { queued: true })).into_response())
}
