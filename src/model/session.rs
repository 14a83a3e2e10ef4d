//! Parsed session and chat turn structures.
//!
//! A [`ParsedSession`] is the format-independent result of parsing one log
//! file. Its totals are always derived from its turns, never set directly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextReferenceUsage;
use super::usage::{McpToolTally, ModeUsage, ToolCallTally, UsageAnalysis};

/// Schema variant a session file was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFormat {
    /// Single JSON document with a root `requests` array.
    Monolithic,
    /// Line-delimited events discriminated by `type`.
    CliAgent,
    /// Line-delimited records discriminated by `kind`.
    Incremental,
    /// Nothing recognisable was found.
    #[default]
    Unknown,
}

impl SessionFormat {
    /// Short label for display.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Monolithic => "json",
            Self::CliAgent => "cli-jsonl",
            Self::Incremental => "incremental-jsonl",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interaction style of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    /// Question/answer chat.
    #[default]
    Ask,
    /// Multi-file edit session.
    Edit,
    /// Autonomous agent.
    Agent,
    /// Planning mode.
    Plan,
    /// User-defined agent.
    CustomAgent,
}

impl InteractionMode {
    /// Map a raw mode string to a mode. Unrecognised values map to [`InteractionMode::Ask`].
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    /// Map a raw mode string, returning `None` for unrecognised values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        // Agent ids look like "github.copilot.editsAgent"; judge by the last segment.
        let tail = lower.rsplit('.').next().unwrap_or(&lower);
        match tail {
            "ask" | "chat" | "panel" | "default" => Some(Self::Ask),
            "edit" | "edits" | "editsagent" | "editingsession" => Some(Self::Edit),
            "agent" | "agentmode" => Some(Self::Agent),
            "plan" | "planning" => Some(Self::Plan),
            "custom" | "customagent" => Some(Self::CustomAgent),
            _ => None,
        }
    }

    /// Stable name used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Edit => "edit",
            Self::Agent => "agent",
            Self::Plan => "plan",
            Self::CustomAgent => "customAgent",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool invocation made during a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier as logged.
    pub tool_name: String,
    /// Serialised arguments, when logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Tool output, when logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Correlation id used to attach results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// A tool call routed through an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpToolCall {
    /// Server name.
    pub server: String,
    /// Tool name on that server.
    pub tool: String,
}

/// One entry of the provider's prompt breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTokenDetail {
    /// Category such as "System" or "User Context".
    pub category: String,
    /// Finer label within the category.
    pub label: String,
    /// Share of the prompt, 0..=100.
    pub percentage_of_prompt: f64,
}

/// Exact token counts reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualUsage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Optional prompt breakdown.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<PromptTokenDetail>,
}

/// One user/assistant exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// 1-based position within the session.
    pub turn_number: usize,
    /// Interaction mode.
    pub mode: InteractionMode,
    /// User text (never null; may be empty).
    pub user_message: String,
    /// Assistant text (never null; may be empty).
    pub assistant_response: String,
    /// Resolved model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tool calls in order.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// MCP-routed calls in order.
    #[serde(default)]
    pub mcp_tools: Vec<McpToolCall>,
    /// Context references used by the turn.
    #[serde(default)]
    pub context_references: ContextReferenceUsage,
    /// Estimated input tokens.
    pub input_tokens_estimate: u64,
    /// Estimated output tokens.
    pub output_tokens_estimate: u64,
    /// Estimated hidden reasoning tokens.
    pub thinking_tokens_estimate: u64,
    /// Provider-reported counts, kept alongside the estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_usage: Option<ActualUsage>,
    /// When the turn was sent, if logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The parsed form of one session file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSession {
    /// Session title (user-set wins over generated).
    pub title: Option<String>,
    /// Detected schema variant.
    pub format: SessionFormat,
    /// Size of the parsed input in bytes.
    pub file_size: u64,
    /// Turns in source order.
    pub turns: Vec<ChatTurn>,
    /// Earliest timestamp seen.
    pub first_interaction: Option<DateTime<Utc>>,
    /// Latest timestamp seen.
    pub last_interaction: Option<DateTime<Utc>>,
    /// Σ input estimates.
    pub total_input_tokens: u64,
    /// Σ output estimates.
    pub total_output_tokens: u64,
    /// Σ thinking estimates.
    pub total_thinking_tokens: u64,
    /// Context references across all turns.
    pub context_references: ContextReferenceUsage,
    /// Tool calls across all turns.
    pub tool_calls: ToolCallTally,
    /// MCP calls across all turns.
    pub mcp_tools: McpToolTally,
    /// Turns per mode.
    pub mode_usage: ModeUsage,
    /// Lines or records skipped while parsing.
    pub warnings: usize,
}

impl ParsedSession {
    /// An empty session of the given format.
    #[must_use]
    pub fn empty(format: SessionFormat, file_size: u64) -> Self {
        Self {
            format,
            file_size,
            ..Self::default()
        }
    }

    /// Build a session from turns, numbering them and deriving every total.
    #[must_use]
    pub fn from_turns(
        format: SessionFormat,
        title: Option<String>,
        mut turns: Vec<ChatTurn>,
        file_size: u64,
    ) -> Self {
        let mut session = Self::empty(format, file_size);
        session.title = title.filter(|t| !t.trim().is_empty());

        for (index, turn) in turns.iter_mut().enumerate() {
            turn.turn_number = index + 1;

            session.total_input_tokens += turn.input_tokens_estimate;
            session.total_output_tokens += turn.output_tokens_estimate;
            session.total_thinking_tokens += turn.thinking_tokens_estimate;
            session.context_references.merge(&turn.context_references);
            session.mode_usage.record(turn.mode);

            for call in &turn.tool_calls {
                session.tool_calls.record(&call.tool_name);
            }
            for mcp in &turn.mcp_tools {
                session.mcp_tools.record(&mcp.server, &mcp.tool);
            }
            if let Some(ts) = turn.timestamp {
                session.observe_timestamp(ts);
            }
        }

        session.turns = turns;
        session
    }

    /// Widen the first/last interaction window to include `ts`.
    pub fn observe_timestamp(&mut self, ts: DateTime<Utc>) {
        if self.first_interaction.map_or(true, |first| ts < first) {
            self.first_interaction = Some(ts);
        }
        if self.last_interaction.map_or(true, |last| ts > last) {
            self.last_interaction = Some(ts);
        }
    }

    /// Number of turns.
    #[must_use]
    pub fn interactions(&self) -> usize {
        self.turns.len()
    }

    /// Input plus output estimate.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    /// Turns whose provider reported exact counts.
    pub fn turns_with_actual_usage(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter().filter(|t| t.actual_usage.is_some())
    }

    /// Mode, tool and context tallies as one rollup.
    #[must_use]
    pub fn usage_analysis(&self) -> UsageAnalysis {
        UsageAnalysis {
            mode_usage: self.mode_usage.clone(),
            tool_calls: self.tool_calls.clone(),
            mcp_tools: self.mcp_tools.clone(),
            context_references: self.context_references.clone(),
        }
    }

    /// Input/output estimates keyed by model; unattributed turns go to `default_model`.
    #[must_use]
    pub fn model_usage(&self, default_model: &str) -> BTreeMap<String, super::usage::ModelUsage> {
        let mut by_model: BTreeMap<String, super::usage::ModelUsage> = BTreeMap::new();
        for turn in &self.turns {
            let model = turn.model.as_deref().unwrap_or(default_model);
            let entry = by_model.entry(model.to_string()).or_default();
            entry.input_tokens += turn.input_tokens_estimate;
            entry.output_tokens += turn.output_tokens_estimate;
        }
        by_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(input: u64, output: u64, mode: InteractionMode, model: Option<&str>) -> ChatTurn {
        ChatTurn {
            mode,
            input_tokens_estimate: input,
            output_tokens_estimate: output,
            model: model.map(String::from),
            ..ChatTurn::default()
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(InteractionMode::from_raw("agent"), InteractionMode::Agent);
        assert_eq!(InteractionMode::from_raw("Edit"), InteractionMode::Edit);
        assert_eq!(
            InteractionMode::from_raw("github.copilot.editsAgent"),
            InteractionMode::Edit
        );
        assert_eq!(InteractionMode::from_raw("customAgent"), InteractionMode::CustomAgent);
        assert_eq!(InteractionMode::from_raw("???"), InteractionMode::Ask);
        assert_eq!(InteractionMode::from_raw(""), InteractionMode::Ask);
    }

    #[test]
    fn test_from_turns_numbers_and_sums() {
        let session = ParsedSession::from_turns(
            SessionFormat::Monolithic,
            Some("Title".into()),
            vec![
                turn(2, 3, InteractionMode::Ask, Some("gpt-4o")),
                turn(5, 7, InteractionMode::Agent, None),
            ],
            100,
        );

        assert_eq!(session.turns[0].turn_number, 1);
        assert_eq!(session.turns[1].turn_number, 2);
        assert_eq!(session.total_input_tokens, 7);
        assert_eq!(session.total_output_tokens, 10);
        assert_eq!(session.mode_usage.ask, 1);
        assert_eq!(session.mode_usage.agent, 1);
        assert_eq!(session.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_empty_session_is_valid() {
        let session = ParsedSession::from_turns(SessionFormat::CliAgent, None, Vec::new(), 0);
        assert_eq!(session.interactions(), 0);
        assert_eq!(session.total_tokens(), 0);
    }

    #[test]
    fn test_blank_title_is_dropped() {
        let session = ParsedSession::from_turns(SessionFormat::Monolithic, Some("  ".into()), vec![], 0);
        assert!(session.title.is_none());
    }

    #[test]
    fn test_model_usage_attributes_default() {
        let session = ParsedSession::from_turns(
            SessionFormat::Incremental,
            None,
            vec![turn(1, 1, InteractionMode::Ask, None), turn(2, 2, InteractionMode::Ask, Some("claude-sonnet-4"))],
            0,
        );
        let usage = session.model_usage("gpt-4o");
        assert_eq!(usage["gpt-4o"].input_tokens, 1);
        assert_eq!(usage["claude-sonnet-4"].output_tokens, 2);
        let sum: u64 = usage.values().map(|u| u.total()).sum();
        assert_eq!(sum, session.total_tokens());
    }
}
