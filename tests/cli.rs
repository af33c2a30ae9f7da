mod common;

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::{FakeOpenAi, API_KEY};

const CORPUS: &str = "Writes Rust services for a living.\n\nPlays chess on weekends.";

fn bio_chat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_bio-chat"))
}

/// Temp dir with a corpus and a config file pointing at it.
fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let corpus_path = tmp.path().join("user_summary.txt");
    fs::write(&corpus_path, CORPUS).unwrap();

    let config_content = format!(
        r#"[corpus]
path = "{}"

[openai]
max_retries = 0
retry_base_ms = 5

{}
"#,
        corpus_path.display(),
        extra_config
    );
    let config_path = tmp.path().join("bio-chat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// A command with the OpenAI environment cleared.
fn bio_chat(config_path: &Path) -> Command {
    let mut cmd = Command::new(bio_chat_binary());
    cmd.arg("--config")
        .arg(config_path)
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_API_URL")
        .env_remove("OPENAI_EMBEDDINGS_URL")
        .env("RUST_LOG", "warn");
    cmd
}

fn run(mut cmd: Command, args: &[&str]) -> (String, String, bool) {
    let output = cmd
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bio-chat binary: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

async fn run_async(cmd: Command, args: &'static [&'static str]) -> (String, String, bool) {
    tokio::task::spawn_blocking(move || run(cmd, args))
        .await
        .unwrap()
}

#[test]
fn test_chunks_needs_no_api_key() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run(bio_chat(&config_path), &["chunks"]);
    assert!(success, "chunks failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 chunks"));
    assert!(stdout.contains("Writes Rust services for a living."));
    assert!(stdout.contains("Plays chess on weekends."));
}

#[test]
fn test_missing_corpus_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bio-chat.toml");
    fs::write(
        &config_path,
        format!(
            "[corpus]\npath = \"{}\"\n",
            tmp.path().join("absent.txt").display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run(bio_chat(&config_path), &["chunks"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read corpus file"), "stderr={}", stderr);
}

#[test]
fn test_ask_without_api_key_fails() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run(bio_chat(&config_path), &["ask", "hello"]);
    assert!(!success);
    assert!(
        stderr.contains("OPENAI_API_KEY environment variable not set"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env("[retrieval]\nmax_chunks = 0\n");

    let (_, stderr, success) = run(bio_chat(&config_path), &["chunks"]);
    assert!(!success);
    assert!(stderr.contains("max_chunks"), "stderr={}", stderr);
}

#[test]
fn test_unknown_config_key_fails() {
    let (_tmp, config_path) = setup_test_env("[db]\npath = \"x.sqlite\"\n");

    let (_, stderr, success) = run(bio_chat(&config_path), &["chunks"]);
    assert!(!success);
    assert!(stderr.contains("Failed to parse config file"), "stderr={}", stderr);
}

fn with_fake(mut cmd: Command, fake: &FakeOpenAi) -> Command {
    cmd.env("OPENAI_API_KEY", API_KEY)
        .env("OPENAI_API_URL", fake.chat_url())
        .env("OPENAI_EMBEDDINGS_URL", fake.embeddings_url());
    cmd
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ask_prints_reply() {
    let fake = FakeOpenAi::start().await;
    let (_tmp, config_path) = setup_test_env("[assistant]\nowner = \"Ada\"\n");

    let cmd = with_fake(bio_chat(&config_path), &fake);
    let (stdout, stderr, success) = run_async(cmd, &["ask", "Does Ada know Rust?"]).await;

    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    // The fake echoes the system prompt.
    assert!(stdout.contains("Writes Rust services for a living."));
    assert!(stdout.contains("Ada"));
    assert_eq!(fake.chat_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_context_explain_prints_ranking() {
    let fake = FakeOpenAi::start().await;
    let (_tmp, config_path) = setup_test_env("");

    let cmd = with_fake(bio_chat(&config_path), &fake);
    let (stdout, stderr, success) =
        run_async(cmd, &["context", "chess", "--max-chunks", "1", "--explain"]).await;

    assert!(success, "context failed: stdout={}, stderr={}", stdout, stderr);
    let ranking: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ranking["kind"], "selected");
    assert_eq!(ranking["chunks"].as_array().unwrap().len(), 1);
    assert_eq!(ranking["chunks"][0]["index"], 1);
    assert_eq!(fake.chat_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_context_blank_query_uses_full_corpus() {
    let fake = FakeOpenAi::start().await;
    let (_tmp, config_path) = setup_test_env("");

    let cmd = with_fake(bio_chat(&config_path), &fake);
    let (stdout, stderr, success) = run_async(cmd, &["context", "  "]).await;

    assert!(success, "context failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.trim_end(), CORPUS);
    assert_eq!(fake.embedding_calls(), 0);
}
