//! Index statistics overview.
//!
//! Summarizes what the saved snapshot holds: chunk and vector counts, vector
//! dimension, the embedding model, and a per-document breakdown. Used by
//! `lrag stats` to confirm a build produced what was expected.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::store::{IndexSnapshot, CHUNKS_FILE, VECTORS_FILE};

/// Run the stats command: load the snapshot and print a summary.
pub fn run_stats(config: &Config, json: bool) -> Result<()> {
    let dir = &config.index.dir;
    let snapshot = IndexSnapshot::load(dir)
        .with_context(|| format!("cannot load index from {}", dir.display()))?;
    let stats = snapshot.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let size: u64 = [VECTORS_FILE, CHUNKS_FILE]
        .iter()
        .filter_map(|f| std::fs::metadata(dir.join(f)).ok())
        .map(|m| m.len())
        .sum();

    println!("Legal RAG Index Stats");
    println!("=====================");
    println!();
    println!("  Index:       {}", dir.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Built:       {}", format_relative(snapshot.built_at()));
    println!("  Model:       {}", stats.embedding_model);
    println!();
    println!("  Chunks:      {}", stats.total_chunks);
    println!("  Vectors:     {}", stats.total_vectors);
    println!("  Dimensions:  {}", stats.dims);

    let mut per_source: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for chunk in snapshot.chunks() {
        let entry = per_source.entry(chunk.source.as_str()).or_default();
        entry.0 += 1;
        entry.1 = entry.1.max(chunk.end_word);
    }

    if !per_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8} {:>10}", "SOURCE", "CHUNKS", "WORDS");
        println!("  {}", "-".repeat(60));
        for (source, (chunks, words)) in &per_source {
            println!("  {:<40} {:>8} {:>10}", source, chunks, words);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to now (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        ts.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
