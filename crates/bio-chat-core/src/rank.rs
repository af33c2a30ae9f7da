//! Embedding-backed context ranking over the chunked corpus.
//!
//! The [`ContextRanker`] owns the corpus, its chunks, and a process-wide
//! embedding cache. The cache is filled in one bulk pass on the first query
//! that needs it and is read-only afterwards.
//!
//! # Ranking Algorithm
//!
//! 1. Empty or whitespace query → full corpus, no provider calls.
//! 2. Ensure every chunk has an embedding (exactly once per process).
//! 3. Embed the query.
//! 4. Score each chunk by cosine similarity against the query.
//! 5. Keep scores `>= similarity_threshold`.
//! 6. Stable sort by score (desc), so ties keep corpus order.
//! 7. Truncate to `max_chunks`.
//! 8. Nothing left → full corpus; otherwise the chunks joined by a blank line.
//!
//! # Initialization
//!
//! The cache sits behind a [`tokio::sync::OnceCell`]. Concurrent first
//! callers all wait on the same in-flight initialization, and nobody can see
//! a partially built cache because the vector is published only once it is
//! complete. If initialization fails, or the future driving it is dropped,
//! the cell stays empty and the next caller starts over.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::chunk::chunk_corpus;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{ProviderError, RankError};
use crate::models::{ChunkEmbedding, FallbackReason, Ranking, ScoredChunk};

/// Minimum cosine similarity for a chunk to count as relevant.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.2;

/// Default number of chunks handed to the chat model.
pub const DEFAULT_MAX_CHUNKS: usize = 3;

/// Ranking tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RankerSettings {
    pub similarity_threshold: f32,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Retrieval index over a static corpus.
pub struct ContextRanker {
    corpus: String,
    chunks: Vec<String>,
    provider: Arc<dyn EmbeddingProvider>,
    settings: RankerSettings,
    cache: OnceCell<Vec<ChunkEmbedding>>,
}

impl ContextRanker {
    /// Chunk `corpus` and build a ranker with an empty embedding cache.
    ///
    /// No provider calls are made until the first non-empty query (or
    /// [`warm_up`](Self::warm_up)).
    pub fn new(
        corpus: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: RankerSettings,
    ) -> Self {
        let corpus = corpus.into();
        let chunks = chunk_corpus(&corpus);
        info!(chunks = chunks.len(), "chunked corpus");

        Self {
            corpus,
            chunks,
            provider,
            settings,
            cache: OnceCell::new(),
        }
    }

    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn settings(&self) -> &RankerSettings {
        &self.settings
    }

    /// Whether the embedding cache has been filled.
    pub fn is_initialized(&self) -> bool {
        self.cache.initialized()
    }

    /// Fill the embedding cache now instead of on the first query.
    pub async fn warm_up(&self) -> Result<(), RankError> {
        if self.chunks.is_empty() {
            return Ok(());
        }
        self.embeddings().await.map(|_| ())
    }

    /// Return the context string for `query`: the best chunks joined by a
    /// blank line, or the full corpus when the query is blank or nothing is
    /// relevant enough.
    pub async fn search_relevant_context(
        &self,
        query: &str,
        max_chunks: usize,
    ) -> Result<String, RankError> {
        let ranking = self.rank(query, max_chunks).await?;
        Ok(ranking.into_context(&self.corpus))
    }

    /// Rank chunks against `query`, keeping scores and the fallback reason.
    ///
    /// A `max_chunks` of 0 is treated as 1.
    pub async fn rank(&self, query: &str, max_chunks: usize) -> Result<Ranking, RankError> {
        if query.trim().is_empty() {
            warn!("empty query provided to context search, using full corpus");
            return Ok(Ranking::FullCorpus {
                reason: FallbackReason::EmptyQuery,
            });
        }

        if self.chunks.is_empty() {
            warn!("corpus has no chunks, using full corpus");
            return Ok(Ranking::FullCorpus {
                reason: FallbackReason::NoChunks,
            });
        }

        let cache = self.embeddings().await?;

        let query_vec = self.provider.embed(query).await?;
        let expected = cache.first().map(|c| c.vector.len()).unwrap_or(0);
        if query_vec.len() != expected {
            error!(
                expected,
                actual = query_vec.len(),
                "query embedding dimensionality does not match cache"
            );
            return Err(RankError::DimensionMismatch {
                expected,
                actual: query_vec.len(),
            });
        }

        let selected = select_top_chunks(
            cache,
            &query_vec,
            self.settings.similarity_threshold,
            max_chunks.max(1),
        );

        if selected.is_empty() {
            info!(
                threshold = self.settings.similarity_threshold,
                "no chunks above threshold, using full corpus"
            );
            return Ok(Ranking::FullCorpus {
                reason: FallbackReason::BelowThreshold,
            });
        }

        let scores: Vec<String> = selected.iter().map(|c| format!("{:.3}", c.score)).collect();
        info!(
            count = selected.len(),
            scores = %scores.join(", "),
            "found relevant chunks"
        );

        Ok(Ranking::Selected { chunks: selected })
    }

    async fn embeddings(&self) -> Result<&[ChunkEmbedding], RankError> {
        let cache = self
            .cache
            .get_or_try_init(|| self.build_cache())
            .await?;
        Ok(cache.as_slice())
    }

    async fn build_cache(&self) -> Result<Vec<ChunkEmbedding>, RankError> {
        info!(
            chunks = self.chunks.len(),
            model = self.provider.model_name(),
            "initializing chunk embeddings"
        );

        let vectors = self.provider.embed_batch(&self.chunks).await?;

        if vectors.len() != self.chunks.len() {
            return Err(ProviderError::Malformed(format!(
                "expected {} embeddings, got {}",
                self.chunks.len(),
                vectors.len()
            ))
            .into());
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        if dims == 0 {
            return Err(ProviderError::Malformed("empty embedding vector".to_string()).into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(ProviderError::Malformed(format!(
                "embedding dimensionality varies: {} vs {}",
                dims,
                bad.len()
            ))
            .into());
        }

        let cache: Vec<ChunkEmbedding> = self
            .chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, vector))| ChunkEmbedding {
                index,
                text: text.clone(),
                vector,
            })
            .collect();

        info!(chunks = cache.len(), dims, "chunk embeddings initialized");
        Ok(cache)
    }
}

/// Score `cache` against `query_vec` and keep the best `max_chunks` at or
/// above `threshold`, best first. Equal scores keep cache order.
pub fn select_top_chunks(
    cache: &[ChunkEmbedding],
    query_vec: &[f32],
    threshold: f32,
    max_chunks: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = cache
        .iter()
        .map(|c| ScoredChunk {
            index: c.index,
            text: c.text.clone(),
            score: cosine_similarity(query_vec, &c.vector),
        })
        .filter(|c| c.score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(max_chunks);
    scored
}
