//! Token estimation and model resolution.
//!
//! Estimates are a character-count heuristic (`ceil(chars × ratio)`), not a
//! tokenizer. They are good for trends and comparisons, not for billing.

mod pricing;
mod tables;

pub use pricing::*;
pub use tables::*;

use serde_json::Value;

/// Estimate tokens for `text` with an explicit ratio.
#[must_use]
pub fn estimate_with_ratio(text: &str, ratio: f64) -> u64 {
    if text.is_empty() || ratio <= 0.0 {
        return 0;
    }
    let chars = text.chars().count() as f64;
    (chars * ratio).ceil() as u64
}

impl ModelTables {
    /// Estimate tokens for `text` using the ratio matched by `model_hint`.
    #[must_use]
    pub fn estimate_tokens(&self, text: &str, model_hint: Option<&str>) -> u64 {
        estimate_with_ratio(text, self.ratio_for(model_hint))
    }

    /// Resolve a model id from a request's `result` object.
    ///
    /// Order: `result.metadata.modelId`, then the longest known display name
    /// found in `result.details`, then the default model. Never fails.
    #[must_use]
    pub fn resolve_model(&self, result: Option<&Value>) -> String {
        self.model_hint(result)
            .unwrap_or_else(|| self.default_model().to_string())
    }

    /// The model a `result` object names, without the default fallback.
    #[must_use]
    pub fn model_hint(&self, result: Option<&Value>) -> Option<String> {
        let result = result?;

        if let Some(id) = result
            .get("metadata")
            .and_then(|m| m.get("modelId"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Some(id.to_string());
        }

        result
            .get("details")
            .and_then(Value::as_str)
            .and_then(|details| self.model_from_details(details))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("", 0.25, 0)]
    #[case("hello", 0.25, 2)]
    #[case("hello world", 0.25, 3)]
    #[case("abcd", 0.25, 1)]
    #[case("abcd", 0.0, 0)]
    fn test_estimate_with_ratio(#[case] text: &str, #[case] ratio: f64, #[case] expected: u64) {
        assert_eq!(estimate_with_ratio(text, ratio), expected);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // Four multi-byte characters.
        assert_eq!(estimate_with_ratio("éééé", 0.25), 1);
    }

    #[test]
    fn test_resolve_model_order() {
        let tables = ModelTables::builtin();

        let explicit = json!({"metadata": {"modelId": "claude-sonnet-4"}, "details": "GPT-4.1"});
        assert_eq!(tables.resolve_model(Some(&explicit)), "claude-sonnet-4");

        let details = json!({"details": "Claude Opus 4.1 • 10x"});
        assert_eq!(tables.resolve_model(Some(&details)), "claude-opus-4.1");

        let empty = json!({"metadata": {"modelId": ""}});
        assert_eq!(tables.resolve_model(Some(&empty)), "gpt-4o");

        assert_eq!(tables.resolve_model(None), "gpt-4o");
        assert_eq!(tables.resolve_model(Some(&json!("not an object"))), "gpt-4o");
        assert_eq!(tables.model_hint(Some(&empty)), None);
        assert_eq!(tables.model_hint(None), None);
        assert_eq!(tables.model_hint(Some(&explicit)).as_deref(), Some("claude-sonnet-4"));
    }

    #[test]
    fn test_exact_key_hint_uses_configured_ratio() {
        let tables = ModelTables::builtin();
        let text = "x".repeat(100);
        assert_eq!(tables.estimate_tokens(&text, Some("claude-sonnet-4")), 24);
        assert_eq!(tables.estimate_tokens(&text, Some("gemini-2.5-pro")), 26);
        assert_eq!(tables.estimate_tokens(&text, Some("unknown")), 25);
    }
}
