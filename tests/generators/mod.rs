//! Synthetic session log generators.
//!
//! Produces the three on-disk shapes (monolithic JSON, CLI agent events,
//! incremental records) with predictable text lengths so tests can compute
//! expected token estimates.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Configuration for generating synthetic sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of user/assistant exchanges.
    pub exchanges: usize,
    /// Characters in each user message.
    pub user_chars: usize,
    /// Characters in each assistant response.
    pub response_chars: usize,
    /// Model id recorded on every exchange, if any.
    pub model: Option<String>,
    /// Add one tool call per exchange.
    pub include_tools: bool,
    /// Session title.
    pub title: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchanges: 3,
            user_chars: 40,
            response_chars: 120,
            model: Some("gpt-4o".to_string()),
            include_tools: false,
            title: None,
        }
    }
}

impl SessionConfig {
    /// Create a minimal session config.
    pub fn minimal() -> Self {
        Self {
            exchanges: 1,
            user_chars: 4,
            response_chars: 4,
            ..Default::default()
        }
    }

    /// Create a large session config for stress testing.
    pub fn large() -> Self {
        Self {
            exchanges: 200,
            user_chars: 400,
            response_chars: 2000,
            include_tools: true,
            ..Default::default()
        }
    }
}

/// Deterministic filler text of exactly `len` characters.
pub fn text(idx: usize, len: usize) -> String {
    const WORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
    let mut out = String::with_capacity(len);
    let mut i = idx;
    while out.len() < len {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(WORDS[i % WORDS.len()]);
        i += 1;
    }
    out.truncate(len);
    out
}

/// Monolithic JSON document with a `requests` array.
pub fn monolithic(config: &SessionConfig) -> String {
    let requests: Vec<Value> = (0..config.exchanges)
        .map(|i| {
            let mut response = vec![json!({ "value": text(i + 1, config.response_chars) })];
            if config.include_tools {
                response.push(json!({
                    "kind": "toolInvocationSerialized",
                    "toolId": "copilot_readFile",
                    "toolCallId": format!("call-{i}"),
                }));
            }
            let mut request = json!({
                "requestId": format!("req-{i}"),
                "message": { "parts": [{ "text": text(i, config.user_chars) }] },
                "response": response,
            });
            if let Some(model) = &config.model {
                request["result"] = json!({ "metadata": { "modelId": model } });
            }
            request
        })
        .collect();

    let mut doc = json!({ "version": 3, "requests": requests });
    if let Some(title) = &config.title {
        doc["customTitle"] = json!(title);
    }
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}

/// CLI agent event log.
pub fn cli_agent(config: &SessionConfig) -> String {
    let mut lines = vec![json!({ "type": "session.start", "data": {} })];
    if let Some(model) = &config.model {
        lines.push(json!({ "type": "session.model_change", "data": { "newModel": model } }));
    }
    for i in 0..config.exchanges {
        lines.push(json!({ "type": "user.message", "data": { "content": text(i, config.user_chars) } }));
        if config.include_tools {
            lines.push(json!({
                "type": "assistant.message",
                "data": { "content": "", "toolRequests": [{ "name": "bash", "toolCallId": format!("t{i}") }] },
            }));
            lines.push(json!({ "type": "tool.result", "data": { "toolCallId": format!("t{i}"), "output": "" } }));
        }
        lines.push(json!({
            "type": "assistant.message",
            "data": { "content": text(i + 1, config.response_chars) },
        }));
    }
    join_lines(&lines)
}

/// Incremental record log.
pub fn incremental(config: &SessionConfig) -> String {
    let mut header = json!({ "sessionId": "synthetic", "version": 1 });
    if let Some(title) = &config.title {
        header["customTitle"] = json!(title);
    }
    let mut lines = vec![json!({ "kind": 0, "v": header })];
    for i in 0..config.exchanges {
        let id = format!("r{i}");
        lines.push(json!({ "kind": 1, "requestId": id, "message": { "text": text(i, config.user_chars) } }));
        let mut response = json!({
            "kind": 2,
            "requestId": id,
            "response": [{ "value": text(i + 1, config.response_chars) }],
        });
        if let Some(model) = &config.model {
            response["model"] = json!(model);
        }
        lines.push(response);
    }
    join_lines(&lines)
}

fn join_lines(lines: &[Value]) -> String {
    lines
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write `content` to `dir/name`, creating parent directories.
pub fn write_session(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create session dir");
    }
    std::fs::write(&path, content).expect("write session file");
    path
}
