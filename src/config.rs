//! Configuration parsing and validation.
//!
//! bio-chat is configured via an optional TOML file. Every field has a
//! default, so running without `--config` is valid as long as the API key
//! is in the environment.
//!
//! # Environment overrides
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `OPENAI_API_KEY` | `openai.api_key` |
//! | `OPENAI_API_URL` | `openai.chat_url` |
//! | `OPENAI_EMBEDDINGS_URL` | `openai.embeddings_url` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use bio_chat_core::rank::{DEFAULT_MAX_CHUNKS, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("user_summary.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_embeddings_url")]
    pub embeddings_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_url: default_chat_url(),
            embeddings_url: default_embeddings_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_chat_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_embeddings_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    1000
}

/// Upper bound for `openai.retry_base_ms`.
pub const MAX_RETRY_BASE_MS: u64 = 60_000;

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4.1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    /// Embed the corpus at startup instead of on the first query.
    #[serde(default)]
    pub warm_up: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_chunks: default_max_chunks(),
            warm_up: false,
        }
    }
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    /// Whose bio this is; substituted for `{owner}` in the prompt.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// System prompt template. Must contain `{context}`.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_owner() -> String {
    "the site owner".to_string()
}

fn default_system_prompt() -> String {
    "You are a personal brand assistant for {owner}. You know their professional background, \
     skills, portfolio projects, and career interests. Answer user questions in 1-3 clear \
     sentences, keeping responses concise, informative, and aligned with {owner}'s experience \
     and personal brand. Avoid long explanations and stay focused on their expertise and \
     achievements. Here is the relevant background about them:\n\n{context}"
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:7071".to_string()
}

impl Config {
    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_API_URL") {
            self.openai.chat_url = url;
        }
        if let Some(url) = non_empty("OPENAI_EMBEDDINGS_URL") {
            self.openai.embeddings_url = url;
        }
    }

    /// The API key, or the startup error every provider-backed command
    /// reports when it is missing.
    pub fn api_key(&self) -> Result<&str> {
        match self.openai.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.max_chunks == 0 {
            bail!("retrieval.max_chunks must be >= 1");
        }

        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
        }

        if self.openai.retry_base_ms > MAX_RETRY_BASE_MS {
            bail!("openai.retry_base_ms must be <= {}", MAX_RETRY_BASE_MS);
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }

        if self.chat.model.trim().is_empty() {
            bail!("chat.model must not be empty");
        }

        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }

        if !self.assistant.system_prompt.contains("{context}") {
            bail!("assistant.system_prompt must contain a {{context}} placeholder");
        }

        Ok(())
    }
}

/// Load configuration from `path` (or defaults when `None`), apply
/// environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => parse_config_file(path)?,
        None => Config::default(),
    };

    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}
