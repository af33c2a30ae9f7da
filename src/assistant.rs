//! The chat pipeline: retrieve context, build the system prompt, ask the
//! chat model.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use bio_chat_core::{
    ChatMessage, ChatProvider, ContextRanker, ProviderError, RankError, RankerSettings,
};

use crate::config::{AssistantConfig, Config};
use crate::corpus::load_corpus;
use crate::openai::{OpenAiChat, OpenAiClient, OpenAiEmbeddings};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("context search failed: {0}")]
    Context(#[from] RankError),

    #[error("chat completion failed: {0}")]
    Chat(#[from] ProviderError),
}

/// Answers visitor messages about the corpus owner.
pub struct Assistant {
    ranker: Arc<ContextRanker>,
    chat: Arc<dyn ChatProvider>,
    persona: AssistantConfig,
    max_chunks: usize,
}

impl Assistant {
    pub fn new(
        ranker: Arc<ContextRanker>,
        chat: Arc<dyn ChatProvider>,
        persona: AssistantConfig,
        max_chunks: usize,
    ) -> Self {
        Self {
            ranker,
            chat,
            persona,
            max_chunks,
        }
    }

    /// Wire the production pipeline: corpus from disk, OpenAI-compatible
    /// embedding and chat providers.
    ///
    /// # Errors
    ///
    /// Fails when the corpus file cannot be read or no API key is set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let corpus = load_corpus(&config.corpus.path)?;
        let client = OpenAiClient::from_config(config)?;

        let embeddings = Arc::new(OpenAiEmbeddings::new(client.clone(), config));
        let chat = Arc::new(OpenAiChat::new(client, config));

        let ranker = ContextRanker::new(
            corpus,
            embeddings,
            RankerSettings {
                similarity_threshold: config.retrieval.similarity_threshold,
            },
        );

        Ok(Self::new(
            Arc::new(ranker),
            chat,
            config.assistant.clone(),
            config.retrieval.max_chunks,
        ))
    }

    pub fn ranker(&self) -> &ContextRanker {
        &self.ranker
    }

    /// Produce a reply to one visitor message.
    pub async fn reply(&self, message: &str) -> Result<String, AssistantError> {
        let context = self
            .ranker
            .search_relevant_context(message, self.max_chunks)
            .await?;

        let messages = vec![
            ChatMessage::system(self.system_prompt(&context)),
            ChatMessage::user(message),
        ];

        debug!(
            model = self.chat.model_name(),
            context_chars = context.len(),
            "sending chat completion"
        );
        let reply = self.chat.complete(&messages).await?;
        if reply.trim().is_empty() {
            return Err(ProviderError::Malformed("chat reply is empty".to_string()).into());
        }
        info!(reply_chars = reply.len(), "chat completion succeeded");

        Ok(reply)
    }

    /// Render the configured prompt template with `context`.
    pub fn system_prompt(&self, context: &str) -> String {
        self.persona
            .system_prompt
            .replace("{owner}", &self.persona.owner)
            .replace("{context}", context)
    }
}
