//! # Legal RAG CLI (`lrag`)
//!
//! Builds the document index and answers questions against it.
//!
//! ## Usage
//!
//! ```bash
//! lrag --config ./config/lrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lrag build` | Extract, chunk and embed all documents, then save the index |
//! | `lrag search "<query>"` | Show the nearest chunks for a query |
//! | `lrag ask "<question>"` | Answer a question from the indexed documents |
//! | `lrag stats` | Summarize the saved index |
//! | `lrag serve` | Start the HTTP server |
//!
//! Diagnostics are logged to stderr; set `RUST_LOG=debug` for more detail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use legal_rag::progress::ProgressMode;
use legal_rag::{ask_cmd, config, ingest, server, stats};

/// Legal RAG: question answering over legal documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lrag",
    about = "Retrieval-augmented question answering over legal documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the documents directory.
    ///
    /// Replaces any existing index. Requires the embedding API key unless
    /// `--dry-run` is given.
    Build {
        /// Show file and chunk counts and an embedding cost estimate
        /// without calling the embedding service.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal,
        /// `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show the chunks nearest to a query.
    Search {
        query: String,

        /// Number of chunks to return.
        #[arg(long)]
        k: Option<usize>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents.
    Ask {
        query: String,

        /// Number of chunks used as context.
        #[arg(long)]
        k: Option<usize>,

        /// Generation model (defaults to `[generation].model`).
        #[arg(long)]
        model: Option<String>,

        /// Print the answer record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarize the saved index.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { dry_run, progress } => {
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            ingest::run_build(&cfg, dry_run, reporter.as_ref()).await?;
        }
        Commands::Search { query, k, json } => {
            ask_cmd::run_search(&cfg, &query, k, json).await?;
        }
        Commands::Ask {
            query,
            k,
            model,
            json,
        } => {
            ask_cmd::run_ask(&cfg, &query, k, model.as_deref(), json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
