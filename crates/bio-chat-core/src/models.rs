//! Core data types shared by the ranker, the providers, and the app.

use serde::{Deserialize, Serialize};

/// A chunk's text paired with its embedding vector.
///
/// `index` is the chunk's position in the chunker output; the cache is
/// keyed by it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEmbedding {
    pub index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A chunk that cleared the similarity threshold for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Why a search answered with the whole corpus instead of chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The query was empty or whitespace.
    EmptyQuery,
    /// The corpus produced no chunks.
    NoChunks,
    /// No chunk reached the similarity threshold.
    BelowThreshold,
}

/// Outcome of ranking the corpus against one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ranking {
    /// Best chunks first, at most `max_chunks` of them.
    Selected { chunks: Vec<ScoredChunk> },
    FullCorpus { reason: FallbackReason },
}

impl Ranking {
    /// Render the ranking as prompt context.
    pub fn into_context(self, corpus: &str) -> String {
        match self {
            Ranking::Selected { chunks } => chunks
                .into_iter()
                .map(|c| c.text)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Ranking::FullCorpus { .. } => corpus.to_string(),
        }
    }
}

/// Chat message role, serialized the way chat-completion APIs expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
