//! Two-tier corpus chunker.
//!
//! Splits the bio corpus into retrieval units. Paragraphs are the natural
//! unit; when the corpus has no paragraph structure the chunker falls back
//! to sentences so the ranker still has something to choose between.
//!
//! # Algorithm
//!
//! 1. Split on blank lines (`\n\n` or `\r\n\r\n`), trim, drop empty pieces.
//! 2. If that produced more than one paragraph, those are the chunks.
//! 3. Otherwise split the original text on sentence ends (`. `, `.\n`,
//!    `.\r\n`), trim, drop empty fragments, and make sure each fragment
//!    ends with a period.
//! 4. If the text has no sentence ends either, the whole trimmed text is
//!    the only chunk.
//!
//! # Example
//!
//! ```rust
//! use bio_chat_core::chunk::chunk_corpus;
//!
//! let chunks = chunk_corpus("Rust developer.\n\nLikes climbing.");
//! assert_eq!(chunks, vec!["Rust developer.", "Likes climbing."]);
//! ```

use sha2::{Digest, Sha256};

const PARAGRAPH_SEPARATORS: &[&str] = &["\n\n", "\r\n\r\n"];
const SENTENCE_SEPARATORS: &[&str] = &[". ", ".\n", ".\r\n"];

/// Split a corpus into ordered, trimmed chunks.
///
/// Chunk order is the order of appearance in the corpus. An empty or
/// whitespace-only corpus yields no chunks; anything else yields at
/// least one.
pub fn chunk_corpus(corpus: &str) -> Vec<String> {
    let paragraphs: Vec<&str> = split_on_any(corpus, PARAGRAPH_SEPARATORS)
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.len() > 1 {
        return paragraphs.into_iter().map(str::to_string).collect();
    }

    let pieces = split_on_any(corpus, SENTENCE_SEPARATORS);
    let whole = corpus.trim();

    // No sentence end at all: the corpus is one chunk, as written.
    if pieces.len() == 1 {
        return if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        };
    }

    let sentences: Vec<&str> = pieces
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        };
    }

    sentences
        .into_iter()
        .map(|s| {
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{}.", s)
            }
        })
        .collect()
}

/// SHA-256 of the corpus text as lowercase hex.
pub fn corpus_fingerprint(corpus: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(corpus.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split `text` wherever any of `separators` starts, trying them in order
/// at each position. Separators must start with an ASCII byte so every cut
/// lands on a char boundary.
fn split_on_any<'a>(text: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match separators
            .iter()
            .find(|sep| bytes[i..].starts_with(sep.as_bytes()))
        {
            Some(sep) => {
                pieces.push(&text[start..i]);
                i += sep.len();
                start = i;
            }
            None => i += 1,
        }
    }
    pieces.push(&text[start..]);

    pieces
}
