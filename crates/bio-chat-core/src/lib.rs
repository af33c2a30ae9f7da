//! # bio-chat core
//!
//! Transport-free logic for bio-chat: corpus chunking, the embedding and
//! chat provider traits, cosine similarity, and the [`rank::ContextRanker`]
//! that owns the once-per-process embedding cache.
//!
//! This crate contains no HTTP client, server, filesystem I/O, or
//! configuration parsing. The `bio-chat` application crate supplies
//! concrete providers and wires everything to the HTTP boundary.

pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rank;

pub use chat::ChatProvider;
pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use error::{ProviderError, RankError};
pub use models::{ChatMessage, ChunkEmbedding, FallbackReason, Ranking, Role, ScoredChunk};
pub use rank::{ContextRanker, RankerSettings};
