//! Flat-file snapshots of an index and its chunk sequence.
//!
//! A snapshot directory holds two companion artifacts that are always written
//! and read together:
//!
//! | File | Contents |
//! |------|----------|
//! | `vectors.bin` | magic `LRAGVEC1`, `u32` dims, `u64` rows, then `rows × dims` little-endian `f32` |
//! | `chunks.json` | embedding model, dims, build time, SHA-256 of `vectors.bin`, and the chunk array |
//!
//! Row *i* of `vectors.bin` is the vector of `chunks[i]`. Loading verifies
//! that invariant (row count, dims, checksum) and refuses to serve a pair of
//! artifacts that disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::{Chunk, IndexStats};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

const MAGIC: &[u8; 8] = b"LRAGVEC1";
const HEADER_LEN: usize = 8 + 4 + 8;

/// On-disk shape of `chunks.json`.
#[derive(Serialize, Deserialize)]
struct ChunkArtifact {
    embedding_model: String,
    dims: usize,
    built_at: DateTime<Utc>,
    vectors_sha256: String,
    chunks: Vec<Chunk>,
}

/// A vector index paired with the chunk sequence it was built from.
///
/// Immutable once constructed; shared read-only between requests.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    index: VectorIndex,
    chunks: Vec<Chunk>,
    embedding_model: String,
    built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Pair an index with its chunks. Fails if the row counts differ.
    pub fn new(index: VectorIndex, chunks: Vec<Chunk>, embedding_model: &str) -> Result<Self> {
        Self::assemble(index, chunks, embedding_model.to_string(), Utc::now())
    }

    fn assemble(
        index: VectorIndex,
        chunks: Vec<Chunk>,
        embedding_model: String,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RagError::IndexCorrupt(format!(
                "index holds {} vectors but there are {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            index,
            chunks,
            embedding_model,
            built_at,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The chunk stored at index row `row`.
    pub fn chunk(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self.chunks.iter().map(|c| c.source.as_str()).collect();
        IndexStats {
            total_chunks: self.chunks.len(),
            total_vectors: self.index.len(),
            dims: self.index.dims(),
            sources: sources.into_iter().map(str::to_string).collect(),
            embedding_model: self.embedding_model.clone(),
            built_at: self.built_at.to_rfc3339(),
        }
    }

    /// True when both artifacts are present in `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTORS_FILE).is_file() && dir.join(CHUNKS_FILE).is_file()
    }

    /// Write both artifacts into `dir`, creating it if needed.
    ///
    /// Each file is written to a temporary sibling and renamed into place.
    /// Returns the combined size of the artifacts in bytes.
    pub fn save(&self, dir: &Path) -> Result<u64> {
        std::fs::create_dir_all(dir)?;

        let vectors = encode_vectors(&self.index);
        let artifact = ChunkArtifact {
            embedding_model: self.embedding_model.clone(),
            dims: self.index.dims(),
            built_at: self.built_at,
            vectors_sha256: sha256_hex(&vectors),
            chunks: self.chunks.clone(),
        };
        let chunks_json = serde_json::to_vec(&artifact)
            .map_err(|e| RagError::IndexCorrupt(format!("failed to serialize chunks: {}", e)))?;

        write_atomic(&dir.join(VECTORS_FILE), &vectors)?;
        write_atomic(&dir.join(CHUNKS_FILE), &chunks_json)?;

        tracing::info!(
            dir = %dir.display(),
            rows = self.index.len(),
            dims = self.index.dims(),
            "index snapshot saved"
        );
        Ok((vectors.len() + chunks_json.len()) as u64)
    }

    /// Load and cross-check both artifacts from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);
        for path in [&vectors_path, &chunks_path] {
            if !path.is_file() {
                return Err(RagError::IndexNotFound(path.clone()));
            }
        }

        let artifact: ChunkArtifact = serde_json::from_slice(&std::fs::read(&chunks_path)?)
            .map_err(|e| RagError::IndexCorrupt(format!("{}: {}", CHUNKS_FILE, e)))?;
        let vector_bytes = std::fs::read(&vectors_path)?;

        if sha256_hex(&vector_bytes) != artifact.vectors_sha256 {
            return Err(RagError::IndexCorrupt(format!(
                "{} does not match the checksum recorded in {}",
                VECTORS_FILE, CHUNKS_FILE
            )));
        }

        let index = decode_vectors(&vector_bytes)?;
        if index.dims() != artifact.dims {
            return Err(RagError::IndexCorrupt(format!(
                "{} holds {}-d vectors but {} records {}",
                VECTORS_FILE,
                index.dims(),
                CHUNKS_FILE,
                artifact.dims
            )));
        }

        let snapshot = Self::assemble(
            index,
            artifact.chunks,
            artifact.embedding_model,
            artifact.built_at,
        )?;
        tracing::info!(
            dir = %dir.display(),
            rows = snapshot.index.len(),
            dims = snapshot.index.dims(),
            "index snapshot loaded"
        );
        Ok(snapshot)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn encode_vectors(index: &VectorIndex) -> Vec<u8> {
    let body = vec_to_blob(index.as_flat());
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(index.dims() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn decode_vectors(bytes: &[u8]) -> Result<VectorIndex> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(RagError::IndexCorrupt(format!(
            "{} has no valid header",
            VECTORS_FILE
        )));
    }
    let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut rows_bytes = [0u8; 8];
    rows_bytes.copy_from_slice(&bytes[12..20]);
    let rows = u64::from_le_bytes(rows_bytes) as usize;

    let body = &bytes[HEADER_LEN..];
    let expected = rows
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RagError::IndexCorrupt("header row count overflows".to_string()))?;
    if body.len() != expected {
        return Err(RagError::IndexCorrupt(format!(
            "{} header declares {} rows of {} dims but body is {} bytes",
            VECTORS_FILE,
            rows,
            dims,
            body.len()
        )));
    }

    let index = VectorIndex::from_flat(dims, blob_to_vec(body))?;
    if index.len() != rows {
        return Err(RagError::IndexCorrupt(format!(
            "{} declares {} rows but decodes to {}",
            VECTORS_FILE,
            rows,
            index.len()
        )));
    }
    Ok(index)
}

/// Encode a float slice as little-endian `f32` bytes.
///
/// ```rust
/// use legal_rag::store::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
