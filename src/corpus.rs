//! Loading the bio corpus from disk.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use bio_chat_core::chunk::corpus_fingerprint;

/// Read the corpus file once at startup.
///
/// A missing or unreadable file is a startup error. An empty file is
/// allowed but logged, since every answer will then go out without any
/// background.
pub fn load_corpus(path: &Path) -> Result<String> {
    let corpus = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;

    if corpus.trim().is_empty() {
        warn!(path = %path.display(), "corpus file is empty");
    }

    info!(
        path = %path.display(),
        bytes = corpus.len(),
        sha256 = %corpus_fingerprint(&corpus),
        "loaded corpus"
    );

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_corpus() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_summary.txt");
        std::fs::write(&path, "Backend engineer.\n\nLoves Rust.").unwrap();

        let corpus = load_corpus(&path).unwrap();
        assert_eq!(corpus, "Backend engineer.\n\nLoves Rust.");
    }

    #[test]
    fn test_missing_corpus_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_summary.txt");

        let err = load_corpus(&path).unwrap_err();
        assert!(err.to_string().contains("user_summary.txt"));
    }

    #[test]
    fn test_empty_corpus_is_allowed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_summary.txt");
        std::fs::write(&path, "").unwrap();

        assert_eq!(load_corpus(&path).unwrap(), "");
    }
}
