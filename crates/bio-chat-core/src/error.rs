//! Typed failures for provider calls and context ranking.

use thiserror::Error;

/// A failed call to an embedding or chat-completion provider.
///
/// The HTTP boundary logs these in full but only ever returns a generic
/// message to the caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the credentials (401/403).
    #[error("provider rejected credentials: {0}")]
    Auth(String),

    /// Still rate limited after all retries.
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success status.
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection, timeout, or other transport failure.
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider answered with something we could not use.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// A failed context search.
#[derive(Debug, Error)]
pub enum RankError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The query vector does not match the cached chunk vectors. Cached
    /// embeddings always share one dimensionality, so this means the
    /// provider changed models underneath us.
    #[error("query embedding has {actual} dimensions, cache has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
