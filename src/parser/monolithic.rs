//! Monolithic JSON sessions: one document with a root `requests` array.

use serde_json::Value;
use tracing::trace;

use super::context::scan_variables;
use super::tools::tool_name;
use super::{parse_timestamp, TurnBuilder};
use crate::model::{ActualUsage, InteractionMode, ParsedSession, PromptTokenDetail, SessionFormat, ToolCall};
use crate::tokens::ModelTables;

/// Response entry kinds that describe a tool invocation.
const TOOL_ENTRY_KINDS: &[&str] = &["toolInvocationSerialized", "prepareToolInvocation"];

/// Parse a whole-document session. `None` when there is no `requests` array.
#[must_use]
pub fn parse_monolithic(doc: &Value, tables: &ModelTables, file_size: u64) -> Option<ParsedSession> {
    let requests = doc.get("requests")?.as_array()?;
    let session_mode = doc.get("mode").and_then(mode_from_value);

    let mut generated_title = None;
    let mut turns = Vec::with_capacity(requests.len());
    for request in requests {
        if !request.is_object() {
            trace!("Skipping non-object request");
            continue;
        }
        let (turn, title) = request_turn(request, tables, session_mode);
        if generated_title.is_none() {
            generated_title = title;
        }
        turns.push(turn.finish(tables));
    }

    let title = string_field(doc, "customTitle").or(generated_title);
    let mut session = ParsedSession::from_turns(SessionFormat::Monolithic, title, turns, file_size);
    observe_session_dates(doc, &mut session);
    Some(session)
}

/// Widen the interaction window with root `creationDate` / `lastMessageDate`.
pub(crate) fn observe_session_dates(root: &Value, session: &mut ParsedSession) {
    for key in ["creationDate", "lastMessageDate"] {
        if let Some(ts) = root.get(key).and_then(parse_timestamp) {
            session.observe_timestamp(ts);
        }
    }
}

/// Build a turn from one request object.
///
/// Returns the turn and the first AI-generated title found in its response.
pub(crate) fn request_turn(
    request: &Value,
    tables: &ModelTables,
    session_mode: Option<InteractionMode>,
) -> (TurnBuilder, Option<String>) {
    let mut turn = TurnBuilder::default();

    if let Some(message) = request.get("message") {
        turn.user_text = message_text(message);
    }
    turn.mode = request_mode(request).or(session_mode).unwrap_or_default();
    turn.timestamp = request.get("timestamp").and_then(parse_timestamp);

    if let Some(vars) = request
        .get("variableData")
        .and_then(|v| v.get("variables"))
        .and_then(Value::as_array)
    {
        scan_variables(vars, &mut turn.context);
    }

    let title = request
        .get("response")
        .and_then(Value::as_array)
        .and_then(|entries| apply_response_entries(entries, &mut turn));

    apply_result(request.get("result"), tables, &mut turn);
    (turn, title)
}

/// Text of a request message: `parts[].text` concatenated, else `text`, else a bare string.
pub(crate) fn message_text(message: &Value) -> String {
    if let Some(text) = message.as_str() {
        return text.to_string();
    }
    if let Some(parts) = message.get("parts").and_then(Value::as_array) {
        let joined: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if !joined.is_empty() {
            return joined;
        }
    }
    string_field(message, "text").unwrap_or_default()
}

/// Fold response entries into `turn`; returns the first generated title.
pub(crate) fn apply_response_entries(entries: &[Value], turn: &mut TurnBuilder) -> Option<String> {
    let mut title = None;

    for entry in entries {
        let kind = entry.get("kind").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "thinking" => {
                if let Some(text) = entry.get("value").map(flatten_text) {
                    turn.thinking_text.push_str(&text);
                }
            }
            "generatedTitle" => {
                if title.is_none() {
                    title = string_field(entry, "title").or_else(|| string_field(entry, "value"));
                }
            }
            k if TOOL_ENTRY_KINDS.contains(&k) => {
                let call_id = string_field(entry, "toolCallId");
                let duplicate = call_id.as_ref().is_some_and(|id| {
                    turn.tool_calls.iter().any(|c| c.call_id.as_ref() == Some(id))
                });
                if duplicate {
                    continue;
                }
                let call = ToolCall {
                    tool_name: tool_name(entry),
                    arguments: entry
                        .get("toolSpecificData")
                        .or_else(|| entry.get("arguments"))
                        .map(Value::to_string),
                    result: entry.get("resultDetails").map(Value::to_string),
                    call_id,
                };
                turn.push_tool_call(call, entry.get("source"));
            }
            _ => {
                if let Some(text) = entry_text(entry) {
                    turn.response_text.push_str(&text);
                }
            }
        }
    }

    title
}

/// Visible text of a response entry.
fn entry_text(entry: &Value) -> Option<String> {
    match entry.get("value") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(obj @ Value::Object(_)) => string_field(obj, "value"),
        _ => entry
            .get("content")
            .and_then(|c| c.as_str().map(String::from).or_else(|| string_field(c, "value"))),
    }
}

/// A string, or an array of strings joined.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Take the model named by `result`, if any, and its provider-reported usage.
///
/// Turns with no model information keep `model` unset; aggregation attributes
/// them to the default model.
pub(crate) fn apply_result(result: Option<&Value>, tables: &ModelTables, turn: &mut TurnBuilder) {
    if let Some(model) = tables.model_hint(result) {
        turn.model = Some(model);
    }
    if let Some(usage) = result.and_then(actual_usage) {
        turn.actual_usage = Some(usage);
    }
}

/// Provider-reported counts: `result.usage`, else `result.metadata`.
fn actual_usage(result: &Value) -> Option<ActualUsage> {
    if let Some(usage) = result.get("usage").filter(|u| u.is_object()) {
        let prompt = usage.get("promptTokens").and_then(Value::as_u64);
        let completion = usage.get("completionTokens").and_then(Value::as_u64);
        if prompt.is_none() && completion.is_none() {
            return None;
        }
        let details = usage
            .get("promptTokenDetails")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|d| PromptTokenDetail {
                        category: string_field(d, "category").unwrap_or_default(),
                        label: string_field(d, "label").unwrap_or_default(),
                        percentage_of_prompt: d
                            .get("percentageOfPrompt")
                            .and_then(Value::as_f64)
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Some(ActualUsage {
            prompt_tokens: prompt.unwrap_or_default(),
            completion_tokens: completion.unwrap_or_default(),
            details,
        });
    }

    let metadata = result.get("metadata")?;
    let prompt = metadata.get("promptTokens").and_then(Value::as_u64);
    let completion = metadata.get("outputTokens").and_then(Value::as_u64);
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(ActualUsage {
        prompt_tokens: prompt.unwrap_or_default(),
        completion_tokens: completion.unwrap_or_default(),
        details: Vec::new(),
    })
}

/// Mode of one request: `modeInfo`, then `agent.id`.
fn request_mode(request: &Value) -> Option<InteractionMode> {
    if let Some(info) = request.get("modeInfo") {
        if info.get("isBuiltin").and_then(Value::as_bool) == Some(false) {
            return Some(InteractionMode::CustomAgent);
        }
        if let Some(mode) = ["kind", "modeId", "modeName"]
            .iter()
            .filter_map(|key| info.get(*key).and_then(Value::as_str))
            .find_map(InteractionMode::parse)
        {
            return Some(mode);
        }
    }
    request
        .get("agent")
        .and_then(|a| a.get("id"))
        .and_then(Value::as_str)
        .and_then(InteractionMode::parse)
}

/// Mode from a string or an object with `id`/`kind`.
pub(crate) fn mode_from_value(value: &Value) -> Option<InteractionMode> {
    match value {
        Value::String(s) => InteractionMode::parse(s),
        Value::Object(_) => ["kind", "id"]
            .iter()
            .filter_map(|key| value.get(*key).and_then(Value::as_str))
            .find_map(InteractionMode::parse),
        _ => None,
    }
}

/// Non-blank string field.
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(doc: &Value) -> ParsedSession {
        parse_monolithic(doc, &ModelTables::builtin(), 0).unwrap()
    }

    #[test]
    fn test_hello_world() {
        let session = parse(&json!({
            "requests": [{"message": {"parts": [{"text": "hello"}]}, "response": [{"value": "world"}]}]
        }));
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "hello");
        assert_eq!(session.turns[0].assistant_response, "world");
        assert_eq!(session.turns[0].input_tokens_estimate, 2);
        assert_eq!(session.turns[0].output_tokens_estimate, 2);
        assert_eq!(session.total_tokens(), 4);
    }

    #[test]
    fn test_unlabelled_turn_keeps_model_unset() {
        let session = parse(&json!({
            "requests": [
                {"message": {"text": "hi"}, "response": [{"value": "yo"}], "result": {"metadata": {}}},
                {"message": {"text": "hi"}, "response": [{"value": "yo"}], "result": {"details": "Claude Sonnet 4 • 1x"}}
            ]
        }));
        assert_eq!(session.turns[0].model, None);
        assert_eq!(session.turns[1].model.as_deref(), Some("claude-sonnet-4"));

        let usage = session.model_usage("gpt-4o");
        assert_eq!(usage.keys().map(String::as_str).collect::<Vec<_>>(), vec!["claude-sonnet-4", "gpt-4o"]);
    }

    #[test]
    fn test_missing_requests_is_none() {
        assert!(parse_monolithic(&json!({"version": 3}), &ModelTables::builtin(), 0).is_none());
        assert!(parse_monolithic(&json!({"requests": {}}), &ModelTables::builtin(), 0).is_none());
    }

    #[test]
    fn test_parts_are_concatenated_and_text_fallback() {
        let session = parse(&json!({
            "requests": [
                {"message": {"parts": [{"text": "ab"}, {"kind": "var"}, {"text": "cd"}]}, "response": []},
                {"message": {"text": "only text"}, "response": []}
            ]
        }));
        assert_eq!(session.turns[0].user_message, "abcd");
        assert_eq!(session.turns[1].user_message, "only text");
        assert_eq!(session.turns[1].turn_number, 2);
    }

    #[test]
    fn test_model_thinking_tools_and_usage() {
        let session = parse(&json!({
            "requests": [{
                "message": {"text": "fix it"},
                "modeInfo": {"kind": "agent"},
                "response": [
                    {"kind": "thinking", "value": "let me think"},
                    {"value": "done"},
                    {"kind": "prepareToolInvocation", "toolName": "copilot_readFile", "toolCallId": "t1"},
                    {"kind": "toolInvocationSerialized", "toolId": "copilot_readFile", "toolCallId": "t1"},
                    {"kind": "toolInvocationSerialized", "toolId": "create_issue", "toolCallId": "t2",
                     "source": {"type": "mcp", "label": "GitHub"}}
                ],
                "result": {
                    "details": "Claude Sonnet 4 • 1x",
                    "usage": {"promptTokens": 120, "completionTokens": 30,
                              "promptTokenDetails": [{"category": "System", "label": "Instructions", "percentageOfPrompt": 40}]}
                }
            }]
        }));

        let turn = &session.turns[0];
        assert_eq!(turn.mode, InteractionMode::Agent);
        assert_eq!(turn.model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(turn.assistant_response, "done");
        assert!(turn.thinking_tokens_estimate > 0);
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.mcp_tools.len(), 1);
        assert_eq!(turn.mcp_tools[0].server, "GitHub");

        let usage = turn.actual_usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 120);
        assert_eq!(usage.details[0].category, "System");
        assert_eq!(session.mode_usage.agent, 1);
        assert_eq!(session.tool_calls.by_tool["copilot_readFile"], 1);
    }

    #[test]
    fn test_custom_title_beats_generated() {
        let generated = parse(&json!({
            "requests": [{"message": {"text": "x"}, "response": [{"kind": "generatedTitle", "title": "AI title"}]}]
        }));
        assert_eq!(generated.title.as_deref(), Some("AI title"));

        let custom = parse(&json!({
            "customTitle": "Mine",
            "requests": [{"message": {"text": "x"}, "response": [{"kind": "generatedTitle", "title": "AI title"}]}]
        }));
        assert_eq!(custom.title.as_deref(), Some("Mine"));
    }

    #[test]
    fn test_timestamps_and_dates() {
        let session = parse(&json!({
            "creationDate": 1_700_000_000_000_i64,
            "requests": [{"message": {"text": "x"}, "timestamp": 1_700_000_100_000_i64, "response": []}]
        }));
        assert_eq!(session.first_interaction.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(session.last_interaction.unwrap().timestamp(), 1_700_000_100);
    }

    #[test]
    fn test_custom_agent_mode() {
        let session = parse(&json!({
            "requests": [{"message": {"text": "x"}, "modeInfo": {"kind": "agent", "isBuiltin": false}, "response": []}]
        }));
        assert_eq!(session.turns[0].mode, InteractionMode::CustomAgent);
    }
}
