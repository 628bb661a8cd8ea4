//! Pricing helpers - per-token cost math and the default price table.
//!
//! Lookup of the active [`CostConfig`](crate::types::CostConfig) row lives
//! on the store (`resolve_pricing`); everything here is pure.

use crate::types::CostConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-1k-token USD rates derived from a cost config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostPer1k {
    /// Input rate
    pub input: f64,
    /// Output rate
    pub output: f64,
    /// Simple mean of input and output rates
    pub average: f64,
}

/// Derive per-1k-token rates from a cost config.
#[must_use]
pub fn cost_per_1k_tokens(config: &CostConfig) -> CostPer1k {
    CostPer1k {
        input: config.input_token_cost,
        output: config.output_token_cost,
        average: (config.input_token_cost + config.output_token_cost) / 2.0,
    }
}

/// Round to 6 decimal places, half-up.
#[must_use]
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Compute the USD cost of a call.
///
/// Returns 0 when either token count is unknown or no pricing row applies;
/// absent pricing is a legitimate "unknown cost" state, never an error.
#[must_use]
pub fn calculate_cost(
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    config: Option<&CostConfig>,
) -> f64 {
    let (Some(input), Some(output)) = (input_tokens, output_tokens) else {
        return 0.0;
    };
    let Some(config) = config else {
        return 0.0;
    };

    let input_cost = (input as f64 / 1000.0) * config.input_token_cost;
    let output_cost = (output as f64 / 1000.0) * config.output_token_cost;
    round6(input_cost + output_cost)
}

/// One row of the default price table.
#[derive(Debug, Clone)]
pub struct DefaultCost {
    /// Provider name
    pub provider: &'static str,
    /// Model name
    pub model: &'static str,
    /// USD per 1k input tokens
    pub input_token_cost: f64,
    /// USD per 1k output tokens
    pub output_token_cost: f64,
    /// First date the price applies
    pub effective_from: NaiveDate,
}

/// Default prices for common openai/anthropic models.
///
/// Seeded through the idempotent upsert, so re-running against an existing
/// store leaves exactly one row per (provider, model, effective_from).
#[must_use]
pub fn default_costs() -> Vec<DefaultCost> {
    let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let row = |provider, model, input, output| DefaultCost {
        provider,
        model,
        input_token_cost: input,
        output_token_cost: output,
        effective_from: from,
    };

    vec![
        // OpenAI
        row("openai", "gpt-4o", 0.005, 0.015),
        row("openai", "gpt-4o-mini", 0.00015, 0.0006),
        row("openai", "gpt-4-turbo", 0.01, 0.03),
        row("openai", "gpt-3.5-turbo", 0.0005, 0.0015),
        // Anthropic
        row("anthropic", "claude-3-5-sonnet-20241022", 0.003, 0.015),
        row("anthropic", "claude-3-opus-20240229", 0.015, 0.075),
        row("anthropic", "claude-3-haiku-20240307", 0.00025, 0.00125),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(input: f64, output: f64) -> CostConfig {
        CostConfig {
            id: "c1".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            input_token_cost: input,
            output_token_cost: output,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            effective_until: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cost_per_1k_averages() {
        let per_1k = cost_per_1k_tokens(&config(0.003, 0.015));
        assert_eq!(per_1k.input, 0.003);
        assert_eq!(per_1k.output, 0.015);
        assert!((per_1k.average - 0.009).abs() < 1e-12);
    }

    #[test]
    fn calculate_cost_basic() {
        let config = config(0.005, 0.015);
        // 1000 in + 1000 out at $0.005/$0.015 per 1k
        let cost = calculate_cost(Some(1000), Some(1000), Some(&config));
        assert!((cost - 0.02).abs() < 1e-9);
    }

    #[test]
    fn calculate_cost_rounds_half_up() {
        // 7 input tokens at $0.0005/1k = 0.0000035, rounds up to 0.000004
        let config = config(0.0005, 0.0);
        let cost = calculate_cost(Some(7), Some(0), Some(&config));
        assert_eq!(cost, 0.000004);
    }

    #[test]
    fn calculate_cost_missing_inputs() {
        let config = config(0.005, 0.015);
        assert_eq!(calculate_cost(None, Some(10), Some(&config)), 0.0);
        assert_eq!(calculate_cost(Some(10), None, Some(&config)), 0.0);
        assert_eq!(calculate_cost(Some(10), Some(10), None), 0.0);
    }

    #[test]
    fn default_costs_cover_both_providers() {
        let costs = default_costs();
        assert!(costs.iter().any(|c| c.provider == "openai" && c.model == "gpt-4o"));
        assert!(costs
            .iter()
            .any(|c| c.provider == "anthropic" && c.model == "claude-3-5-sonnet-20241022"));
        assert!(costs.iter().all(|c| c.input_token_cost >= 0.0 && c.output_token_cost >= 0.0));
    }
}
