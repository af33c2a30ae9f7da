//! OpenAI-compatible embedding and chat-completion providers.
//!
//! Both providers share one [`OpenAiClient`]: a pooled `reqwest` client,
//! the bearer token, and the retry policy.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 401/403 → fail immediately with [`ProviderError::Auth`]
//! - Other HTTP 4xx → fail immediately with [`ProviderError::Api`]
//! - Network errors and timeouts → retry
//! - Backoff: base, 2×base, 4×base, … (exponent capped at 5); base is 1s
//!   unless `openai.retry_base_ms` says otherwise
//!
//! Dropping a request future (e.g. because the HTTP caller went away)
//! cancels the in-flight call and any pending retries.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use bio_chat_core::{ChatMessage, ChatProvider, EmbeddingProvider, ProviderError};

use crate::config::Config;

/// Longest provider error body carried into a [`ProviderError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Shared HTTP plumbing for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    max_retries: u32,
    retry_base: Duration,
}

impl OpenAiClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if no API key is configured, or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            max_retries: config.openai.max_retries,
            retry_base: Duration::from_millis(config.openai.retry_base_ms),
        })
    }

    /// POST `body` as JSON to `url` and decode the JSON answer, retrying
    /// transient failures.
    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base, attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, url, "retrying provider call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .map_err(|e| ProviderError::Malformed(e.to_string()));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let (err, retryable) = classify_status(status.as_u16(), &body_text);
                    if !retryable {
                        return Err(err);
                    }
                    warn!(status = status.as_u16(), attempt, "transient provider error");
                    last_err = Some(err);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "provider request failed");
                    last_err = Some(ProviderError::Transport(e.to_string()));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Transport("provider call failed after retries".into())))
    }
}

/// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, …
/// with the exponent capped at 5. Saturates instead of overflowing.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(5))
}

/// Map a non-success status to a [`ProviderError`] and whether it is
/// worth retrying.
pub fn classify_status(status: u16, body: &str) -> (ProviderError, bool) {
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status {
        401 | 403 => (ProviderError::Auth(body), false),
        429 => (ProviderError::RateLimited(body), true),
        500..=599 => (ProviderError::Api { status, body }, true),
        _ => (ProviderError::Api { status, body }, false),
    }
}

// ============ Embeddings ============

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider calling `POST /v1/embeddings`.
///
/// Texts are sent `batch_size` at a time; vectors come back in input order.
pub struct OpenAiEmbeddings {
    client: OpenAiClient,
    url: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    pub fn new(client: OpenAiClient, config: &Config) -> Self {
        Self {
            client,
            url: config.openai.embeddings_url.clone(),
            model: config.embedding.model.clone(),
            batch_size: config.embedding.batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = EmbeddingsRequest {
                model: &self.model,
                input: batch,
            };
            let response: EmbeddingsResponse = self.client.post_json(&self.url, &request).await?;
            vectors.extend(order_embeddings(response.data, batch.len())?);
        }

        Ok(vectors)
    }
}

/// Put `data[]` back into input order and check nothing is missing.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if data.len() != expected {
        return Err(ProviderError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(ProviderError::Malformed(
            "embedding indices are not 0..n".to_string(),
        ));
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

// ============ Chat completions ============

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat provider calling `POST /v1/chat/completions`.
pub struct OpenAiChat {
    client: OpenAiClient,
    url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, config: &Config) -> Self {
        Self {
            client,
            url: config.openai.chat_url.clone(),
            model: config.chat.model.clone(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };
        let response: ChatCompletionResponse = self.client.post_json(&self.url, &request).await?;
        first_choice_text(response)
    }
}

fn first_choice_text(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))
}
