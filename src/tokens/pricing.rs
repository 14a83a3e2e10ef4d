//! Cost and environmental estimates derived from token totals.
//!
//! These are pure functions of token counts and the pricing table. The
//! conversion constants are rough public estimates, not measurements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tables::ModelTables;
use crate::model::ModelUsage;

/// Grams of CO₂ per 1 000 tokens.
pub const CO2_GRAMS_PER_1K_TOKENS: f64 = 0.2;
/// Litres of cooling water per 1 000 tokens.
pub const WATER_LITERS_PER_1K_TOKENS: f64 = 0.3;
/// Grams of CO₂ one tree absorbs per year.
pub const CO2_GRAMS_PER_TREE_YEAR: f64 = 21_000.0;

/// Estimated USD cost of a per-model usage map.
///
/// Models missing from the pricing table are charged at the default model's
/// rate; if that is missing too they cost nothing.
#[must_use]
pub fn estimate_cost(model_usage: &BTreeMap<String, ModelUsage>, tables: &ModelTables) -> f64 {
    model_usage
        .iter()
        .map(|(model, usage)| {
            tables.pricing_for(model).map_or(0.0, |p| {
                (usage.input_tokens as f64 / 1_000_000.0) * p.input_cost_per_million
                    + (usage.output_tokens as f64 / 1_000_000.0) * p.output_cost_per_million
            })
        })
        .sum()
}

/// Environmental footprint estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalImpact {
    /// Grams of CO₂.
    pub co2_grams: f64,
    /// Litres of water.
    pub water_liters: f64,
    /// Tree-years needed to absorb the CO₂.
    pub tree_years: f64,
}

impl EnvironmentalImpact {
    /// Estimate for a token total.
    #[must_use]
    pub fn from_tokens(tokens: u64) -> Self {
        let thousands = tokens as f64 / 1_000.0;
        let co2_grams = thousands * CO2_GRAMS_PER_1K_TOKENS;
        Self {
            co2_grams,
            water_liters: thousands * WATER_LITERS_PER_1K_TOKENS,
            tree_years: co2_grams / CO2_GRAMS_PER_TREE_YEAR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_for_known_model() {
        let tables = ModelTables::builtin();
        let mut usage = BTreeMap::new();
        usage.insert(
            "gpt-4o".to_string(),
            ModelUsage {
                input_tokens: 1_000_000,
                output_tokens: 1_000_000,
            },
        );
        let cost = estimate_cost(&usage, &tables);
        assert!((cost - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_uses_default_pricing() {
        let tables = ModelTables::builtin();
        let mut known = BTreeMap::new();
        known.insert("gpt-4o".to_string(), ModelUsage { input_tokens: 500, output_tokens: 100 });
        let mut unknown = BTreeMap::new();
        unknown.insert("brand-new".to_string(), ModelUsage { input_tokens: 500, output_tokens: 100 });

        assert!((estimate_cost(&known, &tables) - estimate_cost(&unknown, &tables)).abs() < 1e-12);
    }

    #[test]
    fn test_environmental_impact() {
        let impact = EnvironmentalImpact::from_tokens(105_000);
        assert!((impact.co2_grams - 21.0).abs() < 1e-9);
        assert!((impact.water_liters - 31.5).abs() < 1e-9);
        assert!((impact.tree_years - 0.001).abs() < 1e-9);
        assert_eq!(EnvironmentalImpact::from_tokens(0), EnvironmentalImpact::default());
    }
}
