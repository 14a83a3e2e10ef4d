//! Session log parsing.
//!
//! This module turns the raw bytes of one session file into a
//! [`ParsedSession`], whatever schema variant it uses:
//! - Monolithic JSON with a root `requests` array ([`monolithic`])
//! - CLI agent JSONL discriminated by `type` ([`cli_agent`])
//! - Incremental JSONL discriminated by `kind` ([`incremental`])
//!
//! Parsing never fails on content. Malformed lines are skipped, and a file
//! that matches no variant yields an empty session with a warning.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use chat_tally::parser::parse_session;
//! use chat_tally::tokens::ModelTables;
//!
//! let bytes = br#"{"requests":[{"message":{"parts":[{"text":"hello"}]},"response":[{"value":"world"}]}]}"#;
//! let session = parse_session(bytes, Path::new("session.json"), &ModelTables::builtin());
//! assert_eq!(session.turns.len(), 1);
//! assert_eq!(session.total_tokens(), 4);
//! ```

pub mod cli_agent;
pub mod context;
pub mod incremental;
pub mod lines;
pub mod monolithic;
pub mod tools;

pub use lines::{parse_json_lines, JsonLine, ParseStats};

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TallyError};
use crate::model::{
    ActualUsage, ChatTurn, ContextReferenceUsage, InteractionMode, McpToolCall, ParsedSession,
    SessionFormat, ToolCall,
};
use crate::tokens::ModelTables;

/// Extension of line-delimited session files.
pub const LINE_DELIMITED_EXTENSION: &str = "jsonl";

/// Parse one session file's contents.
///
/// The extension picks the first strategy tried (`.jsonl` line by line,
/// anything else as one document); if that finds nothing recognisable the
/// other strategy is tried before giving up.
#[instrument(skip(content, tables), fields(path = %path.display(), bytes = content.len()))]
pub fn parse_session(content: &[u8], path: &Path, tables: &ModelTables) -> ParsedSession {
    let text = String::from_utf8_lossy(content);
    let file_size = content.len() as u64;

    let session = if is_line_delimited(path) {
        parse_line_mode(&text, tables, file_size).or_else(|| parse_document_mode(&text, tables, file_size))
    } else {
        parse_document_mode(&text, tables, file_size).or_else(|| parse_line_mode(&text, tables, file_size))
    };

    match session {
        Some(session) => {
            debug!(
                format = %session.format,
                turns = session.turns.len(),
                tokens = session.total_tokens(),
                warnings = session.warnings,
                "Parsed session"
            );
            session
        }
        None => {
            warn!(path = %path.display(), "Unrecognised session format, no data");
            let mut empty = ParsedSession::empty(SessionFormat::Unknown, file_size);
            empty.warnings = 1;
            empty
        }
    }
}

/// Detect a file's schema variant without building turns.
#[must_use]
pub fn detect_format(content: &[u8], path: &Path) -> SessionFormat {
    let text = String::from_utf8_lossy(content);
    let from_lines = || {
        let (values, _) = parse_json_lines(&text);
        values.iter().find_map(|line| line_format(&line.value))
    };
    let from_document = || {
        serde_json::from_str::<Value>(&text)
            .ok()
            .filter(|doc| doc.get("requests").is_some_and(Value::is_array))
            .map(|_| SessionFormat::Monolithic)
    };

    let detected = if is_line_delimited(path) {
        from_lines().or_else(from_document)
    } else {
        from_document().or_else(from_lines)
    };
    detected.unwrap_or_default()
}

/// Read and parse a session file.
///
/// A missing path or a directory is a caller error; unreadable content is not.
pub fn parse_session_file(path: &Path, tables: &ModelTables) -> Result<ParsedSession> {
    let metadata = std::fs::metadata(path).map_err(|e| TallyError::from_io_at(path, e))?;
    if !metadata.is_file() {
        return Err(TallyError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read(path).map_err(|e| TallyError::from_io_at(path, e))?;
    Ok(parse_session(&content, path, tables))
}

/// Whether `path` names a line-delimited file.
#[must_use]
pub fn is_line_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(LINE_DELIMITED_EXTENSION))
}

/// Variant signalled by a single line: `type` for CLI events, `kind` for incremental records.
fn line_format(value: &Value) -> Option<SessionFormat> {
    let object = value.as_object()?;
    if object.get("type").is_some_and(Value::is_string) {
        Some(SessionFormat::CliAgent)
    } else if object.contains_key("kind") {
        Some(SessionFormat::Incremental)
    } else {
        None
    }
}

fn parse_line_mode(text: &str, tables: &ModelTables, file_size: u64) -> Option<ParsedSession> {
    let (lines, stats) = parse_json_lines(text);
    if stats.lines_skipped > 0 {
        warn!(
            skipped = stats.lines_skipped,
            first_bad_line = stats.errors.first().map(|e| e.line),
            "Skipped malformed lines"
        );
    }

    let format = lines.iter().find_map(|line| line_format(&line.value))?;
    let mut session = match format {
        SessionFormat::CliAgent => cli_agent::parse_cli_agent(&lines, tables, file_size),
        SessionFormat::Incremental => incremental::parse_incremental(&lines, tables, file_size),
        SessionFormat::Monolithic | SessionFormat::Unknown => return None,
    };
    session.warnings += stats.lines_skipped;
    Some(session)
}

fn parse_document_mode(text: &str, tables: &ModelTables, file_size: u64) -> Option<ParsedSession> {
    let doc: Value = serde_json::from_str(text).ok()?;
    monolithic::parse_monolithic(&doc, tables, file_size)
}

/// Parse a timestamp given as epoch milliseconds or an RFC 3339 string.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// Turn under construction, shared by all three variants.
///
/// Text is collected first and estimated once in [`TurnBuilder::finish`],
/// because some formats only reveal the model after the text.
#[derive(Debug, Clone, Default)]
pub(crate) struct TurnBuilder {
    pub user_text: String,
    pub response_text: String,
    pub thinking_text: String,
    /// Tool output fed back to the model; counts as input.
    pub tool_outputs: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub mcp_tools: Vec<McpToolCall>,
    pub context: ContextReferenceUsage,
    pub model: Option<String>,
    pub mode: InteractionMode,
    pub actual_usage: Option<ActualUsage>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TurnBuilder {
    /// Record a tool call, also as an MCP call when it is one.
    pub fn push_tool_call(&mut self, call: ToolCall, source: Option<&Value>) {
        if let Some(mcp) = tools::classify_mcp(&call.tool_name, source) {
            self.mcp_tools.push(mcp);
        }
        self.tool_calls.push(call);
    }

    /// Estimate tokens and produce the turn. Numbering happens in [`ParsedSession::from_turns`].
    pub fn finish(mut self, tables: &ModelTables) -> ChatTurn {
        let hint = self.model.as_deref();
        let input = tables.estimate_tokens(&self.user_text, hint)
            + self
                .tool_outputs
                .iter()
                .map(|out| tables.estimate_tokens(out, hint))
                .sum::<u64>();
        let output = tables.estimate_tokens(&self.response_text, hint);
        let thinking = tables.estimate_tokens(&self.thinking_text, hint);

        context::scan_text(&self.user_text, &mut self.context);

        ChatTurn {
            turn_number: 0,
            mode: self.mode,
            user_message: self.user_text,
            assistant_response: self.response_text,
            model: self.model,
            tool_calls: self.tool_calls,
            mcp_tools: self.mcp_tools,
            context_references: self.context,
            input_tokens_estimate: input,
            output_tokens_estimate: output,
            thinking_tokens_estimate: thinking,
            actual_usage: self.actual_usage,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn tables() -> ModelTables {
        ModelTables::builtin()
    }

    #[test]
    fn test_detect_format() {
        let json = br#"{"requests":[]}"#;
        assert_eq!(detect_format(json, Path::new("a.json")), SessionFormat::Monolithic);

        let cli = b"{\"type\":\"user.message\",\"data\":{\"content\":\"hi\"}}\n";
        assert_eq!(detect_format(cli, Path::new("a.jsonl")), SessionFormat::CliAgent);

        let inc = b"{\"kind\":0,\"v\":{}}\n";
        assert_eq!(detect_format(inc, Path::new("a.jsonl")), SessionFormat::Incremental);

        assert_eq!(detect_format(b"garbage", Path::new("a.json")), SessionFormat::Unknown);
    }

    #[test]
    fn test_unparseable_file_is_empty_not_error() {
        let session = parse_session(b"{ this is not json", Path::new("broken.json"), &tables());
        assert_eq!(session.format, SessionFormat::Unknown);
        assert!(session.turns.is_empty());
        assert_eq!(session.total_tokens(), 0);
        assert_eq!(session.warnings, 1);
    }

    #[test]
    fn test_jsonl_with_bad_lines_keeps_good_ones() {
        let content = b"not json\n{\"type\":\"user.message\",\"data\":{\"content\":\"hi\"}}\n{oops\n{\"type\":\"assistant.message\",\"data\":{\"content\":\"hello there\"}}\n";
        let session = parse_session(content, Path::new("s.jsonl"), &tables());
        assert_eq!(session.format, SessionFormat::CliAgent);
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.warnings, 2);
    }

    #[test]
    fn test_pretty_printed_document_in_jsonl_file() {
        let content = b"{\n  \"requests\": [\n    {\"message\": {\"text\": \"hi\"}, \"response\": []}\n  ]\n}\n";
        let session = parse_session(content, Path::new("s.jsonl"), &tables());
        assert_eq!(session.format, SessionFormat::Monolithic);
        assert_eq!(session.turns.len(), 1);
    }

    #[test]
    fn test_file_size_is_byte_length() {
        let content = br#"{"requests":[]}"#;
        let session = parse_session(content, Path::new("a.json"), &tables());
        assert_eq!(session.file_size, content.len() as u64);
    }

    #[test]
    fn test_parse_session_file_contract() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_session_file(&dir.path().join("missing.json"), &tables()).unwrap_err();
        assert!(matches!(err, TallyError::FileNotFound { .. }));

        let err = parse_session_file(dir.path(), &tables()).unwrap_err();
        assert!(matches!(err, TallyError::NotAFile { .. }));

        let path: PathBuf = dir.path().join("ok.json");
        std::fs::write(&path, "garbage").unwrap();
        assert!(parse_session_file(&path, &tables()).unwrap().turns.is_empty());
    }

    #[test]
    fn test_parse_timestamp() {
        use serde_json::json;
        assert_eq!(parse_timestamp(&json!(1_700_000_000_000_i64)).unwrap().timestamp(), 1_700_000_000);
        assert_eq!(
            parse_timestamp(&json!("2025-01-02T03:04:05Z")).unwrap().timestamp(),
            1_735_787_045
        );
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
    }
}
