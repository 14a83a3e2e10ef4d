//! Tool call classification.

use serde_json::Value;

use crate::model::McpToolCall;

/// Classify a tool call as MCP-routed.
///
/// An explicit `source` object with `type: "mcp"` wins and names the server
/// through its label. Otherwise names of the form `mcp__server__tool` or
/// `mcp_server_tool` are split on their first separator after the prefix.
#[must_use]
pub fn classify_mcp(tool_name: &str, source: Option<&Value>) -> Option<McpToolCall> {
    if let Some(source) = source {
        if source.get("type").and_then(Value::as_str) == Some("mcp") {
            let server = ["label", "serverLabel", "name"]
                .iter()
                .find_map(|key| source.get(*key).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown");
            return Some(McpToolCall {
                server: server.to_string(),
                tool: strip_mcp_prefix(tool_name).map_or(tool_name, |(_, tool)| tool).to_string(),
            });
        }
    }

    strip_mcp_prefix(tool_name).map(|(server, tool)| McpToolCall {
        server: server.to_string(),
        tool: tool.to_string(),
    })
}

/// Split `mcp__server__tool` / `mcp_server_tool` into (server, tool).
fn strip_mcp_prefix(name: &str) -> Option<(&str, &str)> {
    let (rest, separator) = if let Some(rest) = name.strip_prefix("mcp__") {
        (rest, "__")
    } else if let Some(rest) = name.strip_prefix("mcp_") {
        (rest, "_")
    } else {
        return None;
    };

    match rest.split_once(separator) {
        Some((server, tool)) if !server.is_empty() && !tool.is_empty() => Some((server, tool)),
        _ if !rest.is_empty() => Some((rest, rest)),
        _ => None,
    }
}

/// Best tool name for a logged invocation.
#[must_use]
pub fn tool_name(entry: &Value) -> String {
    ["toolId", "toolName", "name"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
