//! Editor variant detection from path shape.
//!
//! Detection only looks at path components; file contents are never read.

use std::path::{Component, Path};

use super::StorageLocation;

/// Label used when no known component matches.
pub const UNKNOWN_EDITOR: &str = "Unknown";

/// (lowercased path component, editor label), most specific first.
const COMPONENT_EDITORS: &[(&str, &str)] = &[
    (".vscode-server-insiders", "VS Code Server (Insiders)"),
    (".vscode-server", "VS Code Server"),
    (".vscode-remote", "VS Code Remote"),
    ("code - insiders", "VS Code Insiders"),
    ("code - exploration", "VS Code Exploration"),
    ("vscodium", "VSCodium"),
    ("cursor", "Cursor"),
    ("windsurf", "Windsurf"),
    ("code", "VS Code"),
    ("history-session-state", CLI_AGENT_EDITOR),
    ("session-state", CLI_AGENT_EDITOR),
];

/// Label for sessions written by the CLI agent.
pub const CLI_AGENT_EDITOR: &str = "Copilot CLI";

/// Name of the editor or tool that produced a session file.
///
/// Components are checked from the file upwards, so the storage folder
/// nearest the file wins over unrelated ancestors such as a home directory
/// named `code`.
#[must_use]
pub fn detect_editor(path: &Path) -> String {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
            _ => None,
        })
        .collect();

    components
        .iter()
        .rev()
        .find_map(|component| {
            COMPONENT_EDITORS
                .iter()
                .find(|(needle, _)| component == needle)
                .map(|(_, editor)| (*editor).to_string())
        })
        .unwrap_or_else(|| UNKNOWN_EDITOR.to_string())
}

/// Editor for a file found under a known discovery `root`.
///
/// Agent directories have a fixed label. Editor user directories are named
/// by the root itself. Extra directories only look below the root, so the
/// user's own folder names never decide the label.
#[must_use]
pub fn editor_for_root(root: &Path, path: &Path, location: StorageLocation) -> String {
    match location {
        StorageLocation::CliAgent | StorageLocation::IncrementalAgent => CLI_AGENT_EDITOR.to_string(),
        StorageLocation::Workspace | StorageLocation::GlobalLegacy | StorageLocation::ExtensionGlobal => {
            detect_editor(root)
        }
        StorageLocation::OtherAgent => path
            .strip_prefix(root)
            .map_or_else(|_| UNKNOWN_EDITOR.to_string(), detect_editor),
    }
}
