//! Document discovery under `[documents].root`.
//!
//! Walks the root directory, keeps files whose root-relative path matches an
//! include glob and no exclude glob, and returns them sorted by relative path.
//! That order becomes the chunk order, and therefore the index row order.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::DocumentsConfig;

/// A document selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the documents root, `/`-separated as globs see it.
    pub relative_path: String,
    /// File name used as the chunk source tag.
    pub file_name: String,
}

pub fn scan_corpus(config: &DocumentsConfig) -> Result<Vec<SourceFile>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("documents root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| rel_str.clone());

        files.push(SourceFile {
            path: path.to_path_buf(),
            relative_path: rel_str,
            file_name,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::debug!(root = %root.display(), files = files.len(), "corpus scanned");
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
