//! Usage tallies shared by parsed sessions, cache entries and period buckets.
//!
//! All maps are `BTreeMap`s so merged results and their serialised form do not
//! depend on the order in which files were processed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextReferenceUsage;
use super::session::{InteractionMode, ParsedSession, SessionFormat};

/// Token usage attributed to one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Estimated input tokens.
    pub input_tokens: u64,
    /// Estimated output tokens.
    pub output_tokens: u64,
}

impl ModelUsage {
    /// Input plus output.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another usage record.
    pub fn merge(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Token and session counts attributed to one editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorUsage {
    /// Tokens from sessions of this editor.
    pub tokens: u64,
    /// Number of sessions.
    pub sessions: u64,
}

/// Turn counts per interaction mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeUsage {
    /// Ask turns.
    pub ask: u64,
    /// Edit turns.
    pub edit: u64,
    /// Agent turns.
    pub agent: u64,
    /// Plan turns.
    pub plan: u64,
    /// Custom agent turns.
    pub custom_agent: u64,
}

impl ModeUsage {
    /// Count one turn in `mode`.
    pub fn record(&mut self, mode: InteractionMode) {
        match mode {
            InteractionMode::Ask => self.ask += 1,
            InteractionMode::Edit => self.edit += 1,
            InteractionMode::Agent => self.agent += 1,
            InteractionMode::Plan => self.plan += 1,
            InteractionMode::CustomAgent => self.custom_agent += 1,
        }
    }

    /// Total turns counted.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.ask + self.edit + self.agent + self.plan + self.custom_agent
    }

    /// Accumulate another tally.
    pub fn merge(&mut self, other: &Self) {
        self.ask += other.ask;
        self.edit += other.edit;
        self.agent += other.agent;
        self.plan += other.plan;
        self.custom_agent += other.custom_agent;
    }
}

/// Tool call counts by tool name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallTally {
    /// All calls.
    pub total: u64,
    /// Calls per tool name.
    pub by_tool: BTreeMap<String, u64>,
}

impl ToolCallTally {
    /// Count one call of `tool`.
    pub fn record(&mut self, tool: &str) {
        self.total += 1;
        *self.by_tool.entry(tool.to_string()).or_insert(0) += 1;
    }

    /// Accumulate another tally.
    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        for (tool, count) in &other.by_tool {
            *self.by_tool.entry(tool.clone()).or_insert(0) += count;
        }
    }

    /// Top `n` tools by call count, ties broken by name.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut tools: Vec<_> = self.by_tool.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tools.truncate(n);
        tools
    }
}

/// MCP call counts by server and by tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpToolTally {
    /// All MCP calls.
    pub total: u64,
    /// Calls per server.
    pub by_server: BTreeMap<String, u64>,
    /// Calls per tool name.
    pub by_tool: BTreeMap<String, u64>,
}

impl McpToolTally {
    /// Count one call of `tool` on `server`.
    pub fn record(&mut self, server: &str, tool: &str) {
        self.total += 1;
        *self.by_server.entry(server.to_string()).or_insert(0) += 1;
        *self.by_tool.entry(tool.to_string()).or_insert(0) += 1;
    }

    /// Accumulate another tally.
    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        for (server, count) in &other.by_server {
            *self.by_server.entry(server.clone()).or_insert(0) += count;
        }
        for (tool, count) in &other.by_tool {
            *self.by_tool.entry(tool.clone()).or_insert(0) += count;
        }
    }
}

/// Mode, tool and context rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageAnalysis {
    /// Turns per mode.
    pub mode_usage: ModeUsage,
    /// Tool calls.
    pub tool_calls: ToolCallTally,
    /// MCP calls.
    pub mcp_tools: McpToolTally,
    /// Context references.
    pub context_references: ContextReferenceUsage,
}

impl UsageAnalysis {
    /// Accumulate another rollup.
    pub fn merge(&mut self, other: &Self) {
        self.mode_usage.merge(&other.mode_usage);
        self.tool_calls.merge(&other.tool_calls);
        self.mcp_tools.merge(&other.mcp_tools);
        self.context_references.merge(&other.context_references);
    }
}

/// Per-file digest: everything aggregation needs, without the turn bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSummary {
    /// Input plus output estimate.
    pub tokens: u64,
    /// Turn count.
    pub interactions: u64,
    /// Tokens per model.
    pub model_usage: BTreeMap<String, ModelUsage>,
    /// Mode/tool/context rollup.
    pub usage_analysis: UsageAnalysis,
    /// Hidden reasoning estimate.
    pub thinking_tokens: u64,
    /// Session title.
    pub title: Option<String>,
    /// Detected format.
    pub format: SessionFormat,
    /// Earliest timestamp in content.
    pub first_interaction: Option<DateTime<Utc>>,
    /// Latest timestamp in content.
    pub last_interaction: Option<DateTime<Utc>>,
}

impl SessionSummary {
    /// Digest a parsed session; turns without a model count toward `default_model`.
    #[must_use]
    pub fn from_parsed(session: &ParsedSession, default_model: &str) -> Self {
        Self {
            tokens: session.total_tokens(),
            interactions: session.interactions() as u64,
            model_usage: session.model_usage(default_model),
            usage_analysis: session.usage_analysis(),
            thinking_tokens: session.total_thinking_tokens,
            title: session.title.clone(),
            format: session.format,
            first_interaction: session.first_interaction,
            last_interaction: session.last_interaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatTurn;

    #[test]
    fn test_mode_usage_record() {
        let mut usage = ModeUsage::default();
        usage.record(InteractionMode::Agent);
        usage.record(InteractionMode::Agent);
        usage.record(InteractionMode::Plan);
        assert_eq!(usage.agent, 2);
        assert_eq!(usage.total(), 3);
    }

    #[test]
    fn test_tool_tally_top_is_stable() {
        let mut tally = ToolCallTally::default();
        for tool in ["read_file", "grep", "read_file", "apply_patch", "grep"] {
            tally.record(tool);
        }
        assert_eq!(tally.top(2), vec![("grep", 2), ("read_file", 2)]);
        assert_eq!(tally.total, 5);
    }

    #[test]
    fn test_mcp_merge() {
        let mut a = McpToolTally::default();
        a.record("github", "create_issue");
        let mut b = McpToolTally::default();
        b.record("github", "list_prs");
        b.record("playwright", "navigate");
        a.merge(&b);
        assert_eq!(a.total, 3);
        assert_eq!(a.by_server["github"], 2);
        assert_eq!(a.by_tool["navigate"], 1);
    }

    #[test]
    fn test_summary_tokens_match_model_usage() {
        let session = ParsedSession::from_turns(
            SessionFormat::Monolithic,
            None,
            vec![ChatTurn {
                input_tokens_estimate: 4,
                output_tokens_estimate: 6,
                ..ChatTurn::default()
            }],
            10,
        );
        let summary = SessionSummary::from_parsed(&session, "gpt-4o");
        let by_model: u64 = summary.model_usage.values().map(ModelUsage::total).sum();
        assert_eq!(summary.tokens, 10);
        assert_eq!(by_model, summary.tokens);
        assert_eq!(summary.interactions, 1);
    }
}
