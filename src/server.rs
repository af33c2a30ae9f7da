//! HTTP boundary for the website's chat widget.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | `{ "message": "..." }` → `{ "reply": "..." }` |
//! | `GET`  | `/health` | Health check (version, chunk count, cache state) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Invalid request." }
//! ```
//!
//! Malformed requests get 400 and never reach the assistant. Provider and
//! retrieval failures get 500 with a generic message; the details are only
//! logged.
//!
//! # CORS
//!
//! Any origin may call the API. Every `OPTIONS` request is answered
//! directly with the allowed methods and headers, cached for a day.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use bio_chat_core::chunk::corpus_fingerprint;

use crate::assistant::Assistant;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
    corpus_sha256: Arc<str>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        let corpus_sha256 = corpus_fingerprint(assistant.ranker().corpus()).into();
        Self {
            assistant,
            corpus_sha256,
        }
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(PREFLIGHT_MAX_AGE);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "bio-chat listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ POST /api/chat ============

#[derive(Debug)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatReply {
    reply: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatReply>, AppError> {
    let request = parse_chat_request(&body)?;

    let reply = state.assistant.reply(&request.message).await.map_err(|e| {
        error!(error = %e, "chat request failed");
        internal("Failed to generate a reply.")
    })?;

    Ok(Json(ChatReply { reply }))
}

/// Parse `{ "message": "..." }`. The field name is matched without regard
/// to ASCII case; a whitespace-only body is invalid JSON, not empty.
fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, AppError> {
    if body.is_empty() {
        warn!("request body is empty");
        return Err(bad_request("Request body cannot be empty."));
    }

    let fields: Map<String, Value> = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "failed to deserialize request body");
        bad_request("Invalid request.")
    })?;

    let message = fields
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("message"))
        .and_then(|(_, value)| value.as_str())
        .unwrap_or_default();

    if message.is_empty() {
        warn!("request has no message");
        return Err(bad_request("Invalid request."));
    }

    Ok(ChatRequest {
        message: message.to_string(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    chunks: usize,
    embeddings_ready: bool,
    corpus_sha256: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ranker = state.assistant.ranker();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        chunks: ranker.chunks().len(),
        embeddings_ready: ranker.is_initialized(),
        corpus_sha256: state.corpus_sha256.to_string(),
    })
}
