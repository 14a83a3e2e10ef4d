//! Reference tables: character-to-token ratios and per-model pricing.
//!
//! Both tables are static lookup data. Built-in copies ship in `data/` and can
//! be replaced wholesale by files named in the configuration.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Result, TallyError};

const BUILTIN_RATIOS: &str = include_str!("../../data/token_ratios.json");
const BUILTIN_PRICING: &str = include_str!("../../data/model_pricing.json");

/// Ratio used when no table entry matches.
pub const DEFAULT_RATIO: f64 = 0.25;

/// Model assumed when nothing in a record names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// On-disk shape of the ratio table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRatioTable {
    /// Model id → tokens per character.
    #[serde(default)]
    pub ratios: BTreeMap<String, f64>,
}

/// Pricing for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per million input tokens.
    pub input_cost_per_million: f64,
    /// USD per million output tokens.
    pub output_cost_per_million: f64,
    /// Names the model is shown under in free-text details.
    #[serde(default)]
    pub display_names: Vec<String>,
}

/// On-disk shape of the pricing table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingTable {
    /// Model whose pricing stands in for unknown models.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Model id → pricing.
    #[serde(default)]
    pub models: BTreeMap<String, ModelPricing>,
}

static BUILTIN: Lazy<ModelTables> = Lazy::new(|| {
    let ratios = serde_json::from_str(BUILTIN_RATIOS).unwrap_or_else(|e| {
        error!(error = %e, "Built-in token ratio table is invalid");
        TokenRatioTable::default()
    });
    let pricing = serde_json::from_str(BUILTIN_PRICING).unwrap_or_else(|e| {
        error!(error = %e, "Built-in pricing table is invalid");
        PricingTable::default()
    });
    ModelTables::new(ratios, pricing)
});

/// Ratio and pricing tables plus the derived display-name index.
#[derive(Debug, Clone)]
pub struct ModelTables {
    ratios: BTreeMap<String, f64>,
    pricing: BTreeMap<String, ModelPricing>,
    default_model: String,
    /// (display name, model id), longest display name first.
    display_index: Vec<(String, String)>,
}

impl ModelTables {
    /// Build from already-loaded tables.
    #[must_use]
    pub fn new(ratios: TokenRatioTable, pricing: PricingTable) -> Self {
        let default_model = pricing
            .default_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut display_index: Vec<(String, String)> = pricing
            .models
            .iter()
            .flat_map(|(id, p)| {
                p.display_names
                    .iter()
                    .filter(|name| !name.is_empty())
                    .map(move |name| (name.clone(), id.clone()))
            })
            .collect();
        display_index.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            ratios: ratios.ratios,
            pricing: pricing.models,
            default_model,
            display_index,
        }
    }

    /// The tables compiled into the binary.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Load tables, replacing either built-in table with a file when given.
    pub fn load(
        ratios_path: Option<&Path>,
        pricing_path: Option<&Path>,
        default_model: Option<&str>,
    ) -> Result<Self> {
        let ratios = match ratios_path {
            Some(path) => read_table(path)?,
            None => TokenRatioTable {
                ratios: BUILTIN.ratios.clone(),
            },
        };
        let mut pricing = match pricing_path {
            Some(path) => read_table(path)?,
            None => PricingTable {
                default_model: Some(BUILTIN.default_model.clone()),
                models: BUILTIN.pricing.clone(),
            },
        };
        if let Some(model) = default_model {
            pricing.default_model = Some(model.to_string());
        }

        let tables = Self::new(ratios, pricing);
        debug!(
            ratios = tables.ratios.len(),
            models = tables.pricing.len(),
            default_model = %tables.default_model,
            "Loaded model tables"
        );
        Ok(tables)
    }

    /// Model used when a record names none.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Tokens-per-character ratio for a model hint.
    ///
    /// The hint may be an id or a vendor display string. Exact keys win, then
    /// the normalised hint, then the longest key contained in the normalised
    /// hint. A missing, empty or unmatched hint gets [`DEFAULT_RATIO`].
    #[must_use]
    pub fn ratio_for(&self, model_hint: Option<&str>) -> f64 {
        let Some(hint) = model_hint.map(str::trim).filter(|h| !h.is_empty()) else {
            return DEFAULT_RATIO;
        };

        if let Some(ratio) = self.ratios.get(hint) {
            return *ratio;
        }

        let normalized = normalize_model_name(hint);
        if let Some(ratio) = self.ratios.get(&normalized) {
            return *ratio;
        }

        self.ratios
            .iter()
            .filter(|(key, _)| normalized.contains(normalize_model_name(key).as_str()))
            .max_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| b.0.cmp(a.0)))
            .map_or(DEFAULT_RATIO, |(_, ratio)| *ratio)
    }

    /// Pricing for a model, falling back to the default model's pricing.
    #[must_use]
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing
            .get(model)
            .or_else(|| self.pricing.get(&normalize_model_name(model)))
            .or_else(|| self.pricing.get(&self.default_model))
    }

    /// Canonical model id whose longest display name occurs in `details`.
    #[must_use]
    pub fn model_from_details(&self, details: &str) -> Option<&str> {
        self.display_index
            .iter()
            .find(|(name, _)| details.contains(name.as_str()))
            .map(|(_, id)| id.as_str())
    }
}

impl Default for ModelTables {
    fn default() -> Self {
        Self::builtin()
    }
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TallyError::io(format!("Failed to read table: {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| TallyError::InvalidConfig {
        message: format!("{}: {e}", path.display()),
    })
}

/// Lowercase, drop any vendor prefix (`copilot/gpt-4o`), and hyphenate spaces.
#[must_use]
pub fn normalize_model_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let tail = lower.rsplit('/').next().unwrap_or(&lower);
    tail.split_whitespace().collect::<Vec<_>>().join("-")
}
