//! `lrag search` and `lrag ask`.
//!
//! Both commands load the snapshot once, answer a single query and exit.
//! Results go to stdout; `--json` switches to one machine-readable document.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::cost::{estimate_cost, CostEstimate};
use crate::models::{AnswerRecord, SearchHit};
use crate::retriever::Retriever;

const SNIPPET_CHARS: usize = 240;

/// `AnswerRecord` plus its cost, as printed by `ask --json` and `/ask`.
#[derive(Debug, Serialize)]
pub struct AnswerWithCost {
    #[serde(flatten)]
    pub record: AnswerRecord,
    pub estimated_cost: CostEstimate,
}

impl From<AnswerRecord> for AnswerWithCost {
    fn from(record: AnswerRecord) -> Self {
        let estimated_cost = estimate_cost(&record.tokens_used, &record.model);
        Self {
            record,
            estimated_cost,
        }
    }
}

/// Resolve `k` against `[retrieval]`, rejecting values outside `1..=max_k`.
pub fn resolve_k(config: &Config, k: Option<usize>) -> Result<usize> {
    let k = k.unwrap_or(config.retrieval.default_k);
    if k == 0 || k > config.retrieval.max_k {
        bail!("k must be between 1 and {}", config.retrieval.max_k);
    }
    Ok(k)
}

pub async fn run_search(config: &Config, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let k = resolve_k(config, k)?;
    let retriever = Retriever::from_config(config).context("failed to open index")?;
    let hits = retriever.search(query, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_hits(&hits);
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    query: &str,
    k: Option<usize>,
    model: Option<&str>,
    json: bool,
) -> Result<()> {
    if query.chars().count() < 3 {
        bail!("query must be at least 3 characters");
    }
    let k = resolve_k(config, k)?;
    let retriever = Retriever::from_config(config).context("failed to open index")?;
    let answer = AnswerWithCost::from(retriever.ask(query, k, model).await?);

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    let record = &answer.record;
    let rule = "=".repeat(80);
    println!("{}", rule);
    println!("Question: {}", record.query);
    println!("{}", rule);
    println!();
    println!("{}", record.answer);
    println!();
    println!("{}", rule);

    let mut sources: Vec<&str> = record.sources.iter().map(String::as_str).collect();
    sources.sort_unstable();
    sources.dedup();
    println!("Sources: {}", sources.join(", "));
    println!(
        "Tokens: {} (prompt {}, completion {})",
        record.tokens_used.total, record.tokens_used.prompt, record.tokens_used.completion
    );
    println!(
        "Estimated cost: ${} ({})",
        answer.estimated_cost.total_cost, answer.estimated_cost.model
    );
    println!("{}", rule);
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    for hit in hits {
        println!(
            "{}. [{:.2}] {} / chunk {} (words {}-{})",
            hit.rank,
            hit.distance,
            hit.chunk.source,
            hit.chunk.chunk_id,
            hit.chunk.start_word,
            hit.chunk.end_word
        );
        println!("    {}", snippet(&hit.chunk.text));
        println!();
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}
