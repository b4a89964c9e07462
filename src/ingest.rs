//! Build pipeline orchestration.
//!
//! Coordinates the one-shot build: corpus scan → extraction → normalization →
//! chunking → embedding → index → snapshot. Any failure aborts the build
//! before anything is written, so an existing snapshot is only ever replaced
//! by a complete one.

use anyhow::{Context, Result};

use crate::chunk::chunk_words;
use crate::config::Config;
use crate::corpus::scan_corpus;
use crate::cost::embedding_cost;
use crate::embedding::{embed_batched, Embedder, OpenAIEmbedder};
use crate::extract::{extract_file, normalize_whitespace};
use crate::index::VectorIndex;
use crate::models::Chunk;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::store::IndexSnapshot;

/// Chunks of every document in corpus order.
#[derive(Debug, Default)]
pub struct PreparedCorpus {
    pub files: usize,
    pub chunks: Vec<Chunk>,
}

/// What a completed build wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub files: usize,
    pub chunks: usize,
    pub vectors: usize,
    pub dims: usize,
    pub bytes: u64,
}

/// Scan, extract and chunk every document under `[documents].root`.
///
/// The first document that fails to extract aborts the scan.
pub fn prepare_chunks(config: &Config, progress: &dyn BuildProgressReporter) -> Result<PreparedCorpus> {
    let files = scan_corpus(&config.documents)?;
    let mut prepared = PreparedCorpus {
        files: files.len(),
        chunks: Vec::new(),
    };

    for file in &files {
        let raw = extract_file(&file.path)?;
        let text = normalize_whitespace(&raw);
        let chunks = chunk_words(
            &text,
            &file.file_name,
            config.chunking.window_words,
            config.chunking.overlap_words,
        )?;

        if chunks.is_empty() {
            tracing::warn!(file = %file.relative_path, "document has no extractable text");
        }
        progress.report(BuildProgressEvent::Extracting {
            source: file.relative_path.clone(),
            chunks: chunks.len() as u64,
        });
        prepared.chunks.extend(chunks);
    }

    Ok(prepared)
}

/// Embed `prepared` chunks, build the index and save the snapshot to
/// `[index].dir`.
pub async fn build_index(
    config: &Config,
    prepared: PreparedCorpus,
    embedder: &dyn Embedder,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildSummary> {
    if prepared.chunks.is_empty() {
        tracing::warn!(
            root = %config.documents.root.display(),
            "no chunks produced; saving an empty index"
        );
    }

    let texts: Vec<String> = prepared.chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_batched(embedder, &texts, config.embedding.batch_size, progress)
        .await
        .context("embedding failed")?;
    let index = VectorIndex::build(vectors)?;
    let snapshot = IndexSnapshot::new(index, prepared.chunks, embedder.model_name())?;

    let bytes = snapshot
        .save(&config.index.dir)
        .with_context(|| format!("failed to save index to {}", config.index.dir.display()))?;

    Ok(BuildSummary {
        files: prepared.files,
        chunks: snapshot.chunks().len(),
        vectors: snapshot.index().len(),
        dims: snapshot.index().dims(),
        bytes,
    })
}

/// Entry point for `lrag build`.
pub async fn run_build(
    config: &Config,
    dry_run: bool,
    progress: &dyn BuildProgressReporter,
) -> Result<()> {
    let prepared = prepare_chunks(config, progress)?;

    if dry_run {
        let approx_tokens: u64 = prepared
            .chunks
            .iter()
            .map(|c| estimate_tokens(&c.text))
            .sum();
        println!("build (dry-run)");
        println!("  files found: {}", prepared.files);
        println!("  chunks: {}", prepared.chunks.len());
        println!("  approx. embedding tokens: {}", approx_tokens);
        println!("  approx. embedding cost: ${:.6}", embedding_cost(approx_tokens));
        return Ok(());
    }

    let embedder = OpenAIEmbedder::new(&config.embedding)?;
    let summary = build_index(config, prepared, &embedder, progress).await?;

    println!("build");
    println!("  files: {}", summary.files);
    println!("  chunks: {}", summary.chunks);
    println!("  vectors: {}", summary.vectors);
    println!("  dims: {}", summary.dims);
    println!(
        "  size: {:.2} MB",
        summary.bytes as f64 / (1024.0 * 1024.0)
    );
    println!("  index: {}", config.index.dir.display());
    println!("ok");
    Ok(())
}

/// Rough token count (about four characters per token for English text).
fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
