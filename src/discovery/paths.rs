//! Storage roots for session logs.
//!
//! This module knows where editors and CLI agents keep their chat sessions:
//! - Per-editor user directories under the OS config base
//!   (`%APPDATA%`, `~/Library/Application Support`, `$XDG_CONFIG_HOME` or `~/.config`)
//! - Remote/server data directories (`~/.vscode-server/data/User`, ...)
//! - The CLI agent's session directories under `~/.copilot`
//!
//! Nothing here touches the filesystem; existence is checked during the scan.

use std::path::{Path, PathBuf};

use super::StorageLocation;

/// Editor variant folders under the OS config base.
pub const EDITOR_FOLDERS: &[&str] = &[
    "Code",
    "Code - Insiders",
    "Code - Exploration",
    "VSCodium",
    "Cursor",
    "Windsurf",
];

/// Workspace-scoped storage folder inside an editor user directory.
pub const WORKSPACE_STORAGE_DIR: &str = "workspaceStorage";
/// Session folder inside each workspace storage entry.
pub const CHAT_SESSIONS_DIR: &str = "chatSessions";
/// Global storage folder inside an editor user directory.
pub const GLOBAL_STORAGE_DIR: &str = "globalStorage";
/// Legacy folder for sessions opened without a workspace.
pub const EMPTY_WINDOW_SESSIONS_DIR: &str = "emptyWindowChatSessions";
/// Extension-global storage folder of the chat extension.
pub const EXTENSION_STORAGE_DIR: &str = "github.copilot-chat";

/// Remote data directories, relative to the home directory.
const REMOTE_HOME_DIRS: &[&str] = &[
    ".vscode-server/data/User",
    ".vscode-server-insiders/data/User",
    ".vscode-remote/data/User",
];

/// Remote data directories at fixed absolute locations (containers, codespaces).
const REMOTE_ABSOLUTE_DIRS: &[&str] = &[
    "/tmp/.vscode-server/data/User",
    "/workspace/.vscode-server/data/User",
];

/// CLI agent session directory, relative to the home directory.
pub const CLI_AGENT_DIR: &str = ".copilot/session-state";
/// Incremental agent session directory, relative to the home directory.
pub const INCREMENTAL_AGENT_DIR: &str = ".copilot/history-session-state";

/// All roots a discovery pass looks under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRoots {
    /// Editor `User` directories (local and remote).
    pub editor_user_dirs: Vec<PathBuf>,
    /// CLI agent session directories.
    pub cli_agent_dirs: Vec<PathBuf>,
    /// Incremental agent session directories.
    pub incremental_agent_dirs: Vec<PathBuf>,
    /// Extra directories scanned recursively.
    pub other_agent_dirs: Vec<PathBuf>,
}

impl DiscoveryRoots {
    /// Roots derived from a home directory and an OS config base.
    #[must_use]
    pub fn from_bases(home: &Path, config_base: &Path, include_remote: bool) -> Self {
        let mut editor_user_dirs: Vec<PathBuf> = EDITOR_FOLDERS
            .iter()
            .map(|folder| config_base.join(folder).join("User"))
            .collect();

        if include_remote {
            editor_user_dirs.extend(REMOTE_HOME_DIRS.iter().map(|rel| home.join(rel)));
            editor_user_dirs.extend(REMOTE_ABSOLUTE_DIRS.iter().map(PathBuf::from));
        }

        Self {
            editor_user_dirs,
            cli_agent_dirs: vec![home.join(CLI_AGENT_DIR)],
            incremental_agent_dirs: vec![home.join(INCREMENTAL_AGENT_DIR)],
            other_agent_dirs: Vec::new(),
        }
    }

    /// Roots for the current user.
    ///
    /// Falls back to no roots at all when the home directory is unknown, so
    /// discovery yields an empty set instead of failing.
    #[must_use]
    pub fn from_environment(include_remote: bool) -> Self {
        let Some(home) = dirs::home_dir() else {
            tracing::warn!("Home directory not found; no session roots");
            return Self::default();
        };
        let config_base = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        Self::from_bases(&home, &config_base, include_remote)
    }

    /// Add directories scanned as "other agent" storage.
    #[must_use]
    pub fn with_extra_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.other_agent_dirs.extend(dirs);
        self
    }

    /// Every root path, for diagnostics.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.editor_user_dirs
            .iter()
            .chain(&self.cli_agent_dirs)
            .chain(&self.incremental_agent_dirs)
            .chain(&self.other_agent_dirs)
            .map(PathBuf::as_path)
    }

    /// Root and category a path would be discovered under, if any.
    #[must_use]
    pub fn locate(&self, path: &Path) -> Option<(&Path, StorageLocation)> {
        for user_dir in &self.editor_user_dirs {
            let global = user_dir.join(GLOBAL_STORAGE_DIR);
            let location = if path.starts_with(user_dir.join(WORKSPACE_STORAGE_DIR)) {
                StorageLocation::Workspace
            } else if path.starts_with(global.join(EMPTY_WINDOW_SESSIONS_DIR)) {
                StorageLocation::GlobalLegacy
            } else if path.starts_with(global.join(EXTENSION_STORAGE_DIR)) {
                StorageLocation::ExtensionGlobal
            } else {
                continue;
            };
            return Some((user_dir.as_path(), location));
        }

        let agent_roots = [
            (&self.cli_agent_dirs, StorageLocation::CliAgent),
            (&self.incremental_agent_dirs, StorageLocation::IncrementalAgent),
            (&self.other_agent_dirs, StorageLocation::OtherAgent),
        ];
        agent_roots.into_iter().find_map(|(dirs, location)| {
            dirs.iter()
                .find(|dir| path.starts_with(dir))
                .map(|dir| (dir.as_path(), location))
        })
    }
}
