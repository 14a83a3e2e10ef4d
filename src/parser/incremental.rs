//! Incremental session logs: one JSON record per line, discriminated by `kind`.
//!
//! - `kind: 0` is the session header (title, mode, optional embedded `requests`).
//! - `kind: 1` opens a request, keyed by `requestId`.
//! - `kind: 2` adds response content and the model to an open request.
//!
//! Record fields may sit at the top level or inside a `v` object. Turns keep
//! the order in which their `kind: 1` lines appear, after any header requests.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::lines::JsonLine;
use super::monolithic::{
    apply_response_entries, apply_result, message_text, mode_from_value, observe_session_dates,
    request_turn, string_field,
};
use super::TurnBuilder;
use crate::model::{ChatTurn, InteractionMode, ParsedSession, SessionFormat};
use crate::tokens::ModelTables;

const HEADER: u64 = 0;
const REQUEST: u64 = 1;
const RESPONSE: u64 = 2;

/// Build a session from parsed incremental records.
#[must_use]
pub fn parse_incremental(lines: &[JsonLine], tables: &ModelTables, file_size: u64) -> ParsedSession {
    let mut custom_title: Option<String> = None;
    let mut generated_title: Option<String> = None;
    let mut session_mode: Option<InteractionMode> = None;
    let mut header_turns: Vec<ChatTurn> = Vec::new();
    let mut pending: IndexMap<String, TurnBuilder> = IndexMap::new();
    let mut headers: Vec<&Value> = Vec::new();
    let mut warnings = 0;

    for line in lines {
        let Some(kind) = line.value.get("kind").and_then(record_kind) else {
            trace!(line = line.line, "Record without kind, skipping");
            warnings += 1;
            continue;
        };
        let record = line
            .value
            .get("v")
            .filter(|v| v.is_object())
            .unwrap_or(&line.value);

        match kind {
            HEADER => {
                if let Some(title) = string_field(record, "customTitle").or_else(|| string_field(&line.value, "customTitle")) {
                    custom_title = Some(title);
                }
                if let Some(mode) = record.get("mode").and_then(mode_from_value) {
                    session_mode = Some(mode);
                }
                debug!(
                    session_id = string_field(record, "sessionId").as_deref().unwrap_or("-"),
                    version = ?record.get("version"),
                    "Session header"
                );
                if let Some(requests) = record.get("requests").and_then(Value::as_array) {
                    for request in requests.iter().filter(|r| r.is_object()) {
                        let (turn, title) = request_turn(request, tables, session_mode);
                        if generated_title.is_none() {
                            generated_title = title;
                        }
                        header_turns.push(turn.finish(tables));
                    }
                }
                headers.push(record);
            }
            REQUEST => {
                let id = request_id(record, &line.value).unwrap_or_else(|| format!("line-{}", line.line));
                if pending.contains_key(&id) {
                    trace!(line = line.line, request_id = %id, "Duplicate request record, keeping first");
                    continue;
                }
                let (mut turn, title) = request_turn(record, tables, session_mode);
                if turn.user_text.is_empty() {
                    turn.user_text = string_field(record, "text")
                        .or_else(|| record.get("content").map(message_text))
                        .unwrap_or_default();
                }
                if generated_title.is_none() {
                    generated_title = title;
                }
                pending.insert(id, turn);
            }
            RESPONSE => {
                let Some(id) = request_id(record, &line.value) else {
                    warn!(line = line.line, "Response record without requestId, ignoring");
                    warnings += 1;
                    continue;
                };
                let Some(turn) = pending.get_mut(&id) else {
                    warn!(line = line.line, request_id = %id, "Response for unknown request, ignoring");
                    warnings += 1;
                    continue;
                };
                if let Some(title) = apply_response(record, &line.value, tables, turn) {
                    generated_title.get_or_insert(title);
                }
            }
            other => trace!(line = line.line, kind = other, "Ignoring record kind"),
        }
    }

    let mut turns = header_turns;
    turns.extend(pending.into_values().map(|turn| turn.finish(tables)));

    let title = custom_title.or(generated_title);
    let mut session = ParsedSession::from_turns(SessionFormat::Incremental, title, turns, file_size);
    for header in headers {
        observe_session_dates(header, &mut session);
    }
    session.warnings = warnings;
    session
}

/// Fold one response record into its turn. Returns a generated title, if any.
fn apply_response(
    record: &Value,
    line: &Value,
    tables: &ModelTables,
    turn: &mut TurnBuilder,
) -> Option<String> {
    let mut title = None;

    match record.get("response").or_else(|| line.get("v").filter(|v| v.is_array())) {
        Some(Value::Array(entries)) => title = apply_response_entries(entries, turn),
        _ => {
            if let Some(text) = ["value", "content", "text"]
                .iter()
                .find_map(|key| record.get(*key).and_then(Value::as_str))
            {
                turn.response_text.push_str(text);
            }
        }
    }

    if let Some(result) = record.get("result") {
        apply_result(Some(result), tables, turn);
    }
    if let Some(model) = string_field(record, "model").or_else(|| string_field(line, "model")) {
        turn.model = Some(model);
    }
    title
}

/// `kind` as an integer, accepting numeric strings.
fn record_kind(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn request_id(record: &Value, line: &Value) -> Option<String> {
    string_field(record, "requestId").or_else(|| string_field(line, "requestId"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::parse_json_lines;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> ParsedSession {
        let (lines, _) = parse_json_lines(content);
        parse_incremental(&lines, &ModelTables::builtin(), content.len() as u64)
    }

    #[test]
    fn test_header_request_response() {
        let session = parse(concat!(
            r#"{"kind":0,"v":{"sessionId":"s1","customTitle":"My Session","version":3}}"#, "\n",
            r#"{"kind":1,"requestId":"r1","message":{"text":"hello"}}"#, "\n",
            r#"{"kind":2,"requestId":"r1","model":"claude-sonnet-4","response":[{"value":"world"}]}"#,
        ));
        assert_eq!(session.title.as_deref(), Some("My Session"));
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "hello");
        assert_eq!(session.turns[0].assistant_response, "world");
        assert_eq!(session.turns[0].model.as_deref(), Some("claude-sonnet-4"));
    }

    #[test]
    fn test_top_level_header_fields() {
        let session = parse(concat!(
            r#"{"kind":0,"customTitle":"Flat","mode":"edit"}"#, "\n",
            r#"{"kind":1,"requestId":"r1","message":"hi"}"#,
        ));
        assert_eq!(session.title.as_deref(), Some("Flat"));
        assert_eq!(session.turns[0].mode, InteractionMode::Edit);
        assert_eq!(session.turns[0].assistant_response, "");
    }

    #[test]
    fn test_unknown_request_id_is_ignored() {
        let session = parse(concat!(
            r#"{"kind":1,"requestId":"r1","message":{"text":"a"}}"#, "\n",
            r#"{"kind":2,"requestId":"ghost","response":[{"value":"lost"}]}"#, "\n",
            r#"{"kind":2,"requestId":"r1","response":[{"value":"found"}]}"#,
        ));
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].assistant_response, "found");
        assert_eq!(session.warnings, 1);
    }

    #[test]
    fn test_multiple_responses_append_and_order_follows_requests() {
        let session = parse(concat!(
            r#"{"kind":1,"requestId":"b","message":{"text":"first"}}"#, "\n",
            r#"{"kind":1,"requestId":"a","message":{"text":"second"}}"#, "\n",
            r#"{"kind":2,"requestId":"a","v":{"requestId":"a","value":"2"}}"#, "\n",
            r#"{"kind":2,"requestId":"b","response":[{"value":"one"}]}"#, "\n",
            r#"{"kind":2,"requestId":"b","response":[{"value":" more"}]}"#,
        ));
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].user_message, "first");
        assert_eq!(session.turns[0].assistant_response, "one more");
        assert_eq!(session.turns[1].assistant_response, "2");
        assert_eq!(session.turns[1].turn_number, 2);
    }

    #[test]
    fn test_header_requests_come_first() {
        let session = parse(concat!(
            r#"{"kind":0,"v":{"requests":[{"message":{"text":"old"},"response":[{"value":"x"}]}]}}"#, "\n",
            r#"{"kind":1,"requestId":"r9","message":{"text":"new"}}"#,
        ));
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].user_message, "old");
        assert_eq!(session.turns[1].user_message, "new");
    }

    #[test]
    fn test_request_without_id_gets_synthetic_id() {
        let session = parse(concat!(
            r#"{"kind":1,"message":{"text":"a"}}"#, "\n",
            r#"{"kind":1,"message":{"text":"b"}}"#,
        ));
        assert_eq!(session.turns.len(), 2);
    }

    #[test]
    fn test_generated_title_from_response() {
        let session = parse(concat!(
            r#"{"kind":1,"requestId":"r1","message":{"text":"a"}}"#, "\n",
            r#"{"kind":2,"requestId":"r1","response":[{"kind":"generatedTitle","title":"Refactor plan"}]}"#,
        ));
        assert_eq!(session.title.as_deref(), Some("Refactor plan"));
    }
}
