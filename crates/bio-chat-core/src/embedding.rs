//! Embedding provider trait and vector similarity.
//!
//! Concrete providers (the OpenAI-compatible HTTP client) live in the
//! `bio-chat` app crate; tests use in-memory mocks.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Trait for embedding providers.
///
/// Implementations must return vectors of one fixed dimensionality for a
/// given model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts, returning one vector per input in input order.
    ///
    /// The default issues one [`embed`](EmbeddingProvider::embed) call per
    /// text, sequentially. Providers with a batch endpoint override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` when either vector has zero magnitude, and for empty
/// vectors or vectors of different lengths. Never panics.
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

    let mag_a = norm_a.sqrt();
    let mag_b = norm_b.sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
