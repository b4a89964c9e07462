//! TOML configuration.
//!
//! Every command reads one file (default `./config/lrag.toml`). Sections with
//! sensible defaults may be omitted; `[documents]` and `[index]` are required.
//!
//! ```toml
//! [documents]
//! root = "./data/pdfs"
//!
//! [index]
//! dir = "./index"
//!
//! [chunking]
//! window_words = 1000
//! overlap_words = 200
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! batch_size = 100
//!
//! [generation]
//! model = "gpt-4o-mini"
//! temperature = 0.3
//! max_output_tokens = 500
//!
//! [retrieval]
//! default_k = 3
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::validate_window;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub documents: DocumentsConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding `vectors.bin` and `chunks.json`.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_words")]
    pub window_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: default_window_words(),
            overlap_words: default_overlap_words(),
        }
    }
}

fn default_window_words() -> usize {
    1000
}
fn default_overlap_words() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_output_tokens() -> u32 {
    500
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_k: default_max_k(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_max_k() -> usize {
    MAX_K
}

/// Hard ceiling on `k` for every query surface.
pub const MAX_K: usize = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    validate_window(config.chunking.window_words, config.chunking.overlap_words)
        .context("invalid [chunking] section")?;

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    if config.generation.max_output_tokens == 0 {
        anyhow::bail!("generation.max_output_tokens must be > 0");
    }

    if config.retrieval.max_k == 0 || config.retrieval.max_k > MAX_K {
        anyhow::bail!("retrieval.max_k must be in [1, {}]", MAX_K);
    }

    if config.retrieval.default_k == 0 || config.retrieval.default_k > config.retrieval.max_k {
        anyhow::bail!(
            "retrieval.default_k must be in [1, {}]",
            config.retrieval.max_k
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(body: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lrag.toml");
        std::fs::write(&path, body).unwrap();
        (tmp, path)
    }

    const MINIMAL: &str = r#"
[documents]
root = "./data/pdfs"

[index]
dir = "./index"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let (_tmp, path) = write_config(MINIMAL);
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.window_words, 1000);
        assert_eq!(cfg.chunking.overlap_words, 200);
        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.embedding.batch_size, 100);
        assert_eq!(cfg.generation.model, "gpt-4o-mini");
        assert!((cfg.generation.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.generation.max_output_tokens, 500);
        assert_eq!(cfg.retrieval.default_k, 3);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.documents.include_globs, vec!["**/*.pdf", "**/*.txt"]);
    }

    #[test]
    fn test_overlap_not_below_window_rejected() {
        let body = format!("{}\n[chunking]\nwindow_words = 200\noverlap_words = 200\n", MINIMAL);
        let (_tmp, path) = write_config(&body);
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let body = format!("{}\n[embedding]\nbatch_size = 0\n", MINIMAL);
        let (_tmp, path) = write_config(&body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_default_k_above_max_rejected() {
        let body = format!("{}\n[retrieval]\ndefault_k = 11\n", MINIMAL);
        let (_tmp, path) = write_config(&body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_max_k_above_ceiling_rejected() {
        let body = format!("{}\n[retrieval]\nmax_k = 500\n", MINIMAL);
        let (_tmp, path) = write_config(&body);
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("max_k"));
    }

    #[test]
    fn test_lower_max_k_accepted() {
        let body = format!("{}\n[retrieval]\ndefault_k = 2\nmax_k = 5\n", MINIMAL);
        let (_tmp, path) = write_config(&body);
        assert_eq!(load_config(&path).unwrap().retrieval.max_k, 5);
    }

    #[test]
    fn test_missing_index_section_rejected() {
        let (_tmp, path) = write_config("[documents]\nroot = \"./data\"\n");
        assert!(load_config(&path).is_err());
    }
}
