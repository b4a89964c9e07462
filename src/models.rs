//! Core data models used throughout the pipeline.
//!
//! These types represent the chunks, search hits, and answers that flow
//! through the build and query phases.

use serde::{Deserialize, Serialize};

/// A contiguous word window of a source document.
///
/// Chunks are created once at build time and never modified. Their position
/// in the index's chunk sequence is also their vector row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Zero-based emission order within the source document.
    pub chunk_id: usize,
    /// First word of the window (inclusive).
    pub start_word: usize,
    /// One past the last word of the window.
    pub end_word: usize,
    /// File name of the originating document.
    pub source: String,
}

impl Chunk {
    pub fn word_count(&self) -> usize {
        self.end_word - self.start_word
    }
}

/// A single ranked result of a nearest-neighbour query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query (smaller is closer).
    pub distance: f32,
    /// 1-based position in the result list.
    pub rank: usize,
}

/// Token counts reported verbatim by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

/// Result of one `ask` call. Produced per request and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub query: String,
    pub answer: String,
    /// Source tag of every chunk used as context, in rank order.
    pub sources: Vec<String>,
    pub num_chunks_used: usize,
    pub model: String,
    pub tokens_used: TokenUsage,
}

/// Summary of a loaded index, used by `lrag stats` and `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_vectors: usize,
    pub dims: usize,
    /// Distinct source documents, sorted.
    pub sources: Vec<String>,
    pub embedding_model: String,
    pub built_at: String,
}
