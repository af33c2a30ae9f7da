//! # bio-chat
//!
//! A small retrieval-augmented chat service that answers website visitors'
//! questions about one person, grounded in a plain-text bio.
//!
//! The bio is split into chunks once at startup. Chunk embeddings are
//! computed lazily on the first question (or eagerly with
//! `retrieval.warm_up`) and cached for the life of the process. Each
//! question is embedded, the closest chunks become the system-prompt
//! context, and a chat model writes the reply.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ HTTP / CLI │──▶│  Assistant   │──▶│ ContextRanker │──▶ embeddings API
//! │  (axum)    │   │ prompt+chat  │   │ chunks+cache  │
//! └────────────┘   └──────┬───────┘   └───────────────┘
//!                         ▼
//!                  chat completions API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`corpus`] | Loading the bio from disk |
//! | [`openai`] | OpenAI-compatible embedding and chat providers |
//! | [`assistant`] | The retrieve → prompt → complete pipeline |
//! | [`server`] | HTTP endpoints and CORS |
//!
//! Chunking, similarity, and ranking live in the `bio-chat-core` crate,
//! re-exported here as [`core`].

pub mod assistant;
pub mod config;
pub mod corpus;
pub mod openai;
pub mod server;

pub use bio_chat_core as core;
