//! Fixed-window word chunker.
//!
//! Splits normalized document text into [`Chunk`]s of at most `window` words.
//! Each window starts `window - overlap` words after the previous one, so
//! consecutive chunks share exactly `overlap` words and the union of all
//! windows covers the whole word sequence without gaps.

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Reject window/overlap pairs that would never advance.
pub fn validate_window(window: usize, overlap: usize) -> Result<()> {
    if window == 0 {
        return Err(RagError::InvalidConfig(
            "chunk window must be at least one word".to_string(),
        ));
    }
    if overlap >= window {
        return Err(RagError::InvalidConfig(format!(
            "chunk overlap ({}) must be smaller than the window ({})",
            overlap, window
        )));
    }
    Ok(())
}

/// Split `text` into overlapping word windows tagged with `source`.
///
/// Returns an empty vector for text without words; callers treat that as
/// "nothing to index".
pub fn chunk_words(text: &str, source: &str, window: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_window(window, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = window - overlap;
    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));

    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        chunks.push(Chunk {
            text: words[start..end].join(" "),
            chunk_id: chunks.len(),
            start_word: start,
            end_word: end,
            source: source.to_string(),
        });
        start += stride;
    }

    Ok(chunks)
}
