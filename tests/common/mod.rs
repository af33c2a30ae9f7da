//! A fake OpenAI-compatible API for integration tests.
//!
//! Embeddings are keyword axes: `[mentions "Rust", mentions "chess", 0.1]`.
//! Chat completions echo the system prompt back as the reply, so tests can
//! see which context was chosen.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bio_chat::config::Config;

pub const API_KEY: &str = "sk-test";

#[derive(Default)]
pub struct FakeState {
    pub embedding_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    /// `input` arrays received by the embeddings endpoint, one per call.
    pub embedding_inputs: Mutex<Vec<Vec<String>>>,
    /// Last chat request body.
    pub last_chat: Mutex<Option<Value>>,
    /// Statuses to answer with before behaving normally, shared by both endpoints.
    pub failures: Mutex<VecDeque<u16>>,
    /// Replaces the normal chat completion body when set.
    pub chat_override: Mutex<Option<Value>>,
}

pub struct FakeOpenAi {
    pub base: String,
    pub state: Arc<FakeState>,
}

impl FakeOpenAi {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new()
            .route("/v1/embeddings", post(embeddings))
            .route("/v1/chat/completions", post(chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn fail_next(&self, statuses: &[u16]) {
        self.state
            .failures
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
    }

    pub fn set_chat_response(&self, body: Value) {
        *self.state.chat_override.lock().unwrap() = Some(body);
    }

    pub fn embedding_calls(&self) -> usize {
        self.state.embedding_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.state.chat_calls.load(Ordering::SeqCst)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base)
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base)
    }

    /// Config pointing at this server with fast retries.
    pub fn config(&self, corpus: PathBuf) -> Config {
        let mut config = Config::default();
        config.corpus.path = corpus;
        config.openai.api_key = Some(API_KEY.to_string());
        config.openai.chat_url = self.chat_url();
        config.openai.embeddings_url = self.embeddings_url();
        config.openai.max_retries = 2;
        config.openai.retry_base_ms = 5;
        config.openai.timeout_secs = 5;
        config
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let axis = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
    vec![axis("Rust"), axis("chess"), 0.1]
}

fn check_request(state: &FakeState, headers: &HeaderMap) -> Option<Response> {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", API_KEY))
        .unwrap_or(false);
    if !authorized {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Incorrect API key provided" } })),
            )
                .into_response(),
        );
    }

    let failure = state.failures.lock().unwrap().pop_front();
    failure.map(|code| {
        let status = StatusCode::from_u16(code).unwrap();
        (status, Json(json!({ "error": { "message": "injected failure" } }))).into_response()
    })
}

async fn embeddings(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.embedding_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = check_request(&state, &headers) {
        return resp;
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    state.embedding_inputs.lock().unwrap().push(inputs.clone());

    // Reversed on purpose: clients must reorder by `index`.
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, text)| json!({ "object": "embedding", "index": i, "embedding": keyword_vector(text) }))
        .collect();

    Json(json!({ "object": "list", "data": data, "model": body["model"] })).into_response()
}

async fn chat(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = check_request(&state, &headers) {
        return resp;
    }

    *state.last_chat.lock().unwrap() = Some(body.clone());

    if let Some(custom) = state.chat_override.lock().unwrap().clone() {
        return Json(custom).into_response();
    }

    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    Json(json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": system } }
        ]
    }))
    .into_response()
}
