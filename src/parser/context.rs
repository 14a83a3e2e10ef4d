//! Context reference extraction.
//!
//! Two sources feed the same [`ContextReferenceUsage`] shape: `#marker` and
//! `@participant` tokens in the user's text, and structured variables attached
//! to a request.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::model::{ContextKind, ContextReferenceUsage};

/// `#name`, `#name:argument` or `@name`, not preceded by a word character.
/// The argument stops at whitespace and list or closing punctuation.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^\w])([#@])([A-Za-z][A-Za-z0-9]*)(?::([^\s,;)\]'"`]+))?"#)
        .expect("context marker pattern is valid")
});

const INSTRUCTIONS_FILE: &str = "copilot-instructions.md";
const AGENTS_FILE: &str = "AGENTS.md";

fn marker_kind(sigil: &str, name: &str) -> Option<ContextKind> {
    let kind = match (sigil, name) {
        ("#", "file") => ContextKind::File,
        ("#", "selection") => ContextKind::Selection,
        ("#", "symbol") => ContextKind::Symbol,
        ("#", "codebase") => ContextKind::Codebase,
        ("#", "terminalLastCommand") => ContextKind::TerminalLastCommand,
        ("#", "terminalSelection") => ContextKind::TerminalSelection,
        ("#", "clipboard") => ContextKind::Clipboard,
        ("#", "changes") => ContextKind::Changes,
        ("#", "outputPanel") => ContextKind::OutputPanel,
        ("#", "problemsPanel") => ContextKind::ProblemsPanel,
        ("@", "workspace") => ContextKind::Workspace,
        ("@", "terminal") => ContextKind::Terminal,
        ("@", "vscode") => ContextKind::Vscode,
        _ => return None,
    };
    Some(kind)
}

/// Count context markers in free text.
///
/// `#file:<path>` also records `<path>` in `by_path`.
pub fn scan_text(text: &str, usage: &mut ContextReferenceUsage) {
    for caps in MARKER_RE.captures_iter(text) {
        let (Some(sigil), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(kind) = marker_kind(sigil.as_str(), name.as_str()) else {
            continue;
        };
        usage.record(kind);
        if kind == ContextKind::File {
            let path = caps
                .get(3)
                .map(|m| m.as_str().trim_end_matches(['.', ':', '!', '?']))
                .filter(|path| !path.is_empty());
            if let Some(path) = path {
                record_reference(path, usage);
            }
        }
    }
}

/// Count structured variables (`variableData.variables[]`).
///
/// Implicit attachments count as implicit selections. Any referenced path is
/// recorded in `by_path`, and instruction files get their own counters.
pub fn scan_variables(variables: &[Value], usage: &mut ContextReferenceUsage) {
    for variable in variables {
        let kind = variable.get("kind").and_then(Value::as_str).unwrap_or_default();
        if kind == "implicit" || variable.get("isImplicit").and_then(Value::as_bool) == Some(true) {
            usage.record(ContextKind::ImplicitSelection);
        }
        if let Some(path) = variable_path(variable) {
            record_reference(&path, usage);
        }
    }
}

/// Record a referenced path, flagging instruction files.
fn record_reference(path: &str, usage: &mut ContextReferenceUsage) {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if file_name.eq_ignore_ascii_case(INSTRUCTIONS_FILE) {
        usage.record(ContextKind::CopilotInstructions);
    } else if file_name == AGENTS_FILE {
        usage.record(ContextKind::AgentsMd);
    }
    usage.record_path(path);
}

/// Path named by a variable's value, if any.
fn variable_path(variable: &Value) -> Option<String> {
    let value = variable.get("value")?;
    let path = match value {
        Value::String(s) if looks_like_path(s) => Some(s.as_str()),
        Value::Object(_) => value
            .get("fsPath")
            .or_else(|| value.get("path"))
            .or_else(|| value.get("uri").and_then(|u| u.get("fsPath").or_else(|| u.get("path"))))
            .and_then(Value::as_str),
        _ => None,
    }?;
    (!path.is_empty()).then(|| path.to_string())
}

fn looks_like_path(s: &str) -> bool {
    !s.contains('\n') && (s.contains('/') || s.contains('\\') || s.starts_with("file:"))
}
