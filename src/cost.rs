//! Approximate USD cost of generation and embedding calls.
//!
//! Prices are per million tokens and hard-coded; they drift as providers
//! change pricing, so treat the result as an estimate.

use serde::Serialize;

use crate::models::TokenUsage;

const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// `(model, input price, output price)` per 1M tokens.
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-3.5-turbo", 0.50, 1.50),
    ("gpt-4", 30.00, 60.00),
];

/// `text-embedding-3-small`, per 1M tokens.
const EMBEDDING_PRICE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    #[serde(rename = "input_cost_usd")]
    pub input_cost: f64,
    #[serde(rename = "output_cost_usd")]
    pub output_cost: f64,
    #[serde(rename = "total_cost_usd")]
    pub total_cost: f64,
    /// The model whose prices were applied.
    pub model: String,
}

/// Estimate the cost of one generation call.
///
/// A model missing from the price table is billed at `gpt-4o-mini` prices and
/// the estimate names `gpt-4o-mini` as its model.
pub fn estimate_cost(usage: &TokenUsage, model: &str) -> CostEstimate {
    let (model, input_price, output_price) = match PRICES.iter().find(|(m, _, _)| *m == model) {
        Some(&entry) => entry,
        None => {
            tracing::warn!(
                requested = model,
                fallback = FALLBACK_MODEL,
                "no price for model; using fallback prices"
            );
            PRICES[0]
        }
    };

    let input_cost = per_million(usage.prompt, input_price);
    let output_cost = per_million(usage.completion, output_price);
    CostEstimate {
        input_cost: round6(input_cost),
        output_cost: round6(output_cost),
        total_cost: round6(input_cost + output_cost),
        model: model.to_string(),
    }
}

/// Estimated cost of embedding `tokens` tokens.
pub fn embedding_cost(tokens: u64) -> f64 {
    round6(per_million(tokens, EMBEDDING_PRICE))
}

fn per_million(tokens: u64, price: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * price
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
