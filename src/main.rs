//! # bio-chat CLI
//!
//! ## Usage
//!
//! ```bash
//! bio-chat --config ./config/bio-chat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bio-chat serve` | Start the HTTP chat API |
//! | `bio-chat ask "<message>"` | Answer one message and print the reply |
//! | `bio-chat context "<query>"` | Show the context a message would get |
//! | `bio-chat chunks` | Print the corpus chunks (no API calls) |
//!
//! Logs go to stderr. Set `RUST_LOG` to change verbosity; `--log-json`
//! switches to JSON lines.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bio_chat::assistant::Assistant;
use bio_chat::config::{self, Config};
use bio_chat::core::chunk::chunk_corpus;
use bio_chat::core::Ranking;
use bio_chat::corpus::load_corpus;
use bio_chat::server::{self, AppState};

const DEFAULT_LOG_FILTER: &str = "info,bio_chat=info,bio_chat_core=info";

/// bio-chat: answer visitor questions about one person from their bio.
#[derive(Parser)]
#[command(name = "bio-chat", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `POST /api/chat` and `GET /health` on `server.bind`.
    Serve {
        /// Override `server.bind` (e.g. `127.0.0.1:8080`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Answer a single message and print the reply.
    Ask {
        /// The visitor's message.
        message: String,
    },

    /// Show the context that would be sent to the chat model for a query.
    Context {
        /// The query to rank chunks against.
        query: String,

        /// Override `retrieval.max_chunks`.
        #[arg(long)]
        max_chunks: Option<usize>,

        /// Print the ranking (scores, fallback reason) as JSON instead of the
        /// context text.
        #[arg(long)]
        explain: bool,
    },

    /// Print the corpus chunks. Needs no API key.
    Chunks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => run_serve(config, bind).await?,
        Commands::Ask { message } => run_ask(&config, &message).await?,
        Commands::Context {
            query,
            max_chunks,
            explain,
        } => run_context(&config, &query, max_chunks, explain).await?,
        Commands::Chunks => run_chunks(&config)?,
    }

    Ok(())
}

fn init_logging(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

async fn run_serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(&config)?);

    if config.retrieval.warm_up {
        assistant.ranker().warm_up().await?;
        tracing::info!("embedding cache warmed up");
    }

    let bind = bind.unwrap_or(config.server.bind);
    server::run_server(&bind, AppState::new(assistant)).await
}

async fn run_ask(config: &Config, message: &str) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(config)?;
    let reply = assistant.reply(message).await?;
    println!("{}", reply);
    Ok(())
}

async fn run_context(
    config: &Config,
    query: &str,
    max_chunks: Option<usize>,
    explain: bool,
) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(config)?;
    let ranker = assistant.ranker();
    let max_chunks = max_chunks.unwrap_or(config.retrieval.max_chunks);

    let ranking = ranker.rank(query, max_chunks).await?;

    if explain {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }

    if let Ranking::Selected { chunks } = &ranking {
        for chunk in chunks {
            eprintln!("[{}] score={:.3}", chunk.index, chunk.score);
        }
    }
    println!("{}", ranking.into_context(ranker.corpus()));
    Ok(())
}

fn run_chunks(config: &Config) -> anyhow::Result<()> {
    let corpus = load_corpus(&config.corpus.path)?;
    let chunks = chunk_corpus(&corpus);

    println!("{} chunks", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        println!("--- [{}] {} chars ---", i, chunk.chars().count());
        println!("{}", chunk);
    }
    Ok(())
}
