//! Chat-completion provider trait.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::ChatMessage;

/// Trait for chat-completion backends.
///
/// Takes the full ordered message list (system prompt first) and returns
/// the assistant's reply text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4.1"`).
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
