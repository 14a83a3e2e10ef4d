//! CLI agent event logs: one JSON event per line, discriminated by `type`.
//!
//! A `user.message` opens a turn. Assistant messages and tool results that
//! follow attach to it until the next user message. Assistant output that
//! arrives before any user message gets a turn with an empty user message.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;

use super::lines::JsonLine;
use super::monolithic::string_field;
use super::{parse_timestamp, TurnBuilder};
use crate::model::{InteractionMode, ParsedSession, SessionFormat, ToolCall};
use crate::tokens::ModelTables;

const USER_MESSAGE: &str = "user.message";
const ASSISTANT_MESSAGE: &str = "assistant.message";
const TOOL_RESULT: &str = "tool.result";
const MODEL_CHANGE: &str = "session.model_change";

/// Build a session from parsed CLI agent events.
#[must_use]
pub fn parse_cli_agent(lines: &[JsonLine], tables: &ModelTables, file_size: u64) -> ParsedSession {
    let mut state = CliState::default();

    for line in lines {
        let Some(event_type) = line.value.get("type").and_then(Value::as_str) else {
            trace!(line = line.line, "Event without type, skipping");
            state.warnings += 1;
            continue;
        };
        let data = line.value.get("data").unwrap_or(&Value::Null);
        let timestamp = line.value.get("timestamp").and_then(parse_timestamp);
        if let Some(ts) = timestamp {
            state.timestamps.push(ts);
        }

        if let Some(model) = string_field(&line.value, "model").or_else(|| string_field(data, "model")) {
            state.model = Some(model);
        }

        match event_type {
            USER_MESSAGE => state.user_message(data, timestamp, tables),
            ASSISTANT_MESSAGE => state.assistant_message(data, timestamp),
            TOOL_RESULT => state.tool_result(data, timestamp),
            MODEL_CHANGE => {
                if let Some(model) = string_field(data, "newModel") {
                    state.model = Some(model);
                }
            }
            other => trace!(line = line.line, event = other, "Ignoring event"),
        }

        if let (Some(turn), Some(model)) = (state.current.as_mut(), state.model.as_ref()) {
            turn.model = Some(model.clone());
        }
    }

    state.close_turn(tables);
    let mut session = ParsedSession::from_turns(SessionFormat::CliAgent, None, state.turns, file_size);
    for ts in state.timestamps {
        session.observe_timestamp(ts);
    }
    session.warnings = state.warnings;
    session
}

#[derive(Default)]
struct CliState {
    turns: Vec<crate::model::ChatTurn>,
    current: Option<TurnBuilder>,
    model: Option<String>,
    timestamps: Vec<DateTime<Utc>>,
    warnings: usize,
}

impl CliState {
    fn open_turn(&self, timestamp: Option<DateTime<Utc>>) -> TurnBuilder {
        TurnBuilder {
            mode: InteractionMode::Agent,
            model: self.model.clone(),
            timestamp,
            ..TurnBuilder::default()
        }
    }

    fn close_turn(&mut self, tables: &ModelTables) {
        if let Some(turn) = self.current.take() {
            self.turns.push(turn.finish(tables));
        }
    }

    fn current_or_open(&mut self, timestamp: Option<DateTime<Utc>>) -> &mut TurnBuilder {
        if self.current.is_none() {
            self.current = Some(self.open_turn(timestamp));
        }
        self.current.get_or_insert_with(TurnBuilder::default)
    }

    fn user_message(&mut self, data: &Value, timestamp: Option<DateTime<Utc>>, tables: &ModelTables) {
        self.close_turn(tables);
        let mut turn = self.open_turn(timestamp);
        turn.user_text = content(data);
        if let Some(mode) = data.get("mode").and_then(Value::as_str).and_then(InteractionMode::parse) {
            turn.mode = mode;
        }
        self.current = Some(turn);
    }

    fn assistant_message(&mut self, data: &Value, timestamp: Option<DateTime<Utc>>) {
        let turn = self.current_or_open(timestamp);

        let text = content(data);
        if !text.is_empty() {
            if !turn.response_text.is_empty() {
                turn.response_text.push_str("\n\n");
            }
            turn.response_text.push_str(&text);
        }

        if let Some(requests) = data.get("toolRequests").and_then(Value::as_array) {
            for request in requests {
                let call = ToolCall {
                    tool_name: string_field(request, "name").unwrap_or_else(|| "unknown".to_string()),
                    arguments: request.get("arguments").map(value_text),
                    result: None,
                    call_id: string_field(request, "toolCallId"),
                };
                turn.push_tool_call(call, None);
            }
        }
    }

    fn tool_result(&mut self, data: &Value, timestamp: Option<DateTime<Utc>>) {
        let turn = self.current_or_open(timestamp);

        let output = ["output", "result", "content"]
            .iter()
            .find_map(|key| data.get(*key))
            .map(value_text)
            .unwrap_or_default();

        let call_id = string_field(data, "toolCallId");
        let matched = call_id.as_ref().and_then(|id| {
            turn.tool_calls
                .iter_mut()
                .find(|call| call.call_id.as_ref() == Some(id))
        });
        match matched {
            Some(call) => call.result = Some(output.clone()),
            None => {
                if let Some(name) = string_field(data, "toolName") {
                    let call = ToolCall {
                        tool_name: name,
                        arguments: None,
                        result: Some(output.clone()),
                        call_id,
                    };
                    turn.push_tool_call(call, None);
                }
            }
        }

        if !output.is_empty() {
            turn.tool_outputs.push(output);
        }
    }
}

/// `data.content`, falling back to `data.text`.
fn content(data: &Value) -> String {
    data.get("content")
        .or_else(|| data.get("text"))
        .map(value_text)
        .unwrap_or_default()
}

/// A string as-is; anything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::parse_json_lines;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> ParsedSession {
        let (lines, _) = parse_json_lines(content);
        parse_cli_agent(&lines, &ModelTables::builtin(), content.len() as u64)
    }

    #[test]
    fn test_user_then_assistant_is_one_turn() {
        let session = parse(concat!(
            r#"{"type":"user.message","data":{"content":"hi"}}"#,
            "\n",
            r#"{"type":"assistant.message","data":{"content":"hello there"}}"#,
        ));
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "hi");
        assert_eq!(session.turns[0].assistant_response, "hello there");
        assert_eq!(session.turns[0].mode, InteractionMode::Agent);
        assert!(session.title.is_none());
    }

    #[test]
    fn test_tool_results_attach_to_current_turn() {
        let session = parse(concat!(
            r#"{"type":"user.message","data":{"content":"list files"}}"#, "\n",
            r#"{"type":"assistant.message","data":{"content":"","toolRequests":[{"name":"bash","toolCallId":"c1","arguments":{"command":"ls"}}]}}"#, "\n",
            r#"{"type":"tool.result","data":{"toolCallId":"c1","output":"a.txt b.txt"}}"#, "\n",
            r#"{"type":"assistant.message","data":{"content":"two files"}}"#, "\n",
            r#"{"type":"user.message","data":{"content":"thanks"}}"#,
        ));

        assert_eq!(session.turns.len(), 2);
        let first = &session.turns[0];
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].result.as_deref(), Some("a.txt b.txt"));
        assert_eq!(first.tool_calls[0].arguments.as_deref(), Some(r#"{"command":"ls"}"#));
        assert_eq!(first.assistant_response, "two files");
        // "list files" (10 chars) + "a.txt b.txt" (11 chars) at 0.25.
        assert_eq!(first.input_tokens_estimate, 3 + 3);
        assert_eq!(session.turns[1].assistant_response, "");
    }

    #[test]
    fn test_model_change_attributes_following_turns() {
        let session = parse(concat!(
            r#"{"type":"session.model_change","data":{"newModel":"claude-sonnet-4"}}"#, "\n",
            r#"{"type":"user.message","data":{"content":"a"}}"#, "\n",
            r#"{"type":"assistant.message","data":{"content":"b"}}"#, "\n",
            r#"{"type":"user.message","data":{"content":"c"},"model":"gpt-5"}"#,
        ));
        assert_eq!(session.turns[0].model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(session.turns[1].model.as_deref(), Some("gpt-5"));
    }

    #[test]
    fn test_assistant_before_user_and_untyped_lines() {
        let session = parse(concat!(
            r#"{"type":"assistant.message","data":{"content":"welcome"}}"#, "\n",
            r#"{"no_type":true}"#, "\n",
            r#"{"type":"session.start","data":{}}"#,
        ));
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "");
        assert_eq!(session.turns[0].assistant_response, "welcome");
        assert_eq!(session.warnings, 1);
    }

    #[test]
    fn test_mcp_tool_requests() {
        let session = parse(concat!(
            r#"{"type":"user.message","data":{"content":"x"}}"#, "\n",
            r#"{"type":"assistant.message","data":{"toolRequests":[{"name":"mcp__github__list_issues"}]}}"#,
        ));
        assert_eq!(session.mcp_tools.total, 1);
        assert_eq!(session.mcp_tools.by_server["github"], 1);
    }

    #[test]
    fn test_event_timestamps_widen_window() {
        let session = parse(concat!(
            r#"{"type":"session.start","timestamp":"2025-01-01T00:00:00Z","data":{}}"#, "\n",
            r#"{"type":"user.message","timestamp":"2025-01-01T00:05:00Z","data":{"content":"x"}}"#,
        ));
        assert_eq!(session.first_interaction.unwrap().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(session.last_interaction.unwrap().to_rfc3339(), "2025-01-01T00:05:00+00:00");
    }
}
