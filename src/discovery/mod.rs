//! Session file discovery.
//!
//! This module finds candidate session logs without parsing them. It handles:
//! - Editor variants (VS Code, Insiders, VSCodium, Cursor, Windsurf, ...)
//! - OS config-base conventions and remote/server data directories
//! - The CLI agent's session directories
//! - Editor detection from path shape
//!
//! Discovery never fails. Missing roots and unreadable entries simply
//! contribute no files.

mod editor;
mod paths;
mod scan;

pub use editor::*;
pub use paths::*;
pub use scan::*;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage location category of a session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageLocation {
    /// `workspaceStorage/<hash>/chatSessions`.
    Workspace,
    /// Legacy global empty-window sessions.
    GlobalLegacy,
    /// Chat extension's global storage (arbitrarily nested).
    ExtensionGlobal,
    /// CLI agent session directory.
    CliAgent,
    /// Incremental agent session directory.
    IncrementalAgent,
    /// User-configured extra directory.
    OtherAgent,
}

impl StorageLocation {
    /// Display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::GlobalLegacy => "global-legacy",
            Self::ExtensionGlobal => "extension-global",
            Self::CliAgent => "cli-agent",
            Self::IncrementalAgent => "incremental-agent",
            Self::OtherAgent => "other-agent",
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A discovered session log.
///
/// Identity is the absolute path; size and modification time are as of the
/// last stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Where the file was found.
    pub location: StorageLocation,
    /// Editor or tool that produced it.
    pub editor: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Discover session files for the current user.
#[must_use]
pub fn discover(include_remote: bool, extra_dirs: &[PathBuf], max_depth: usize) -> Vec<SessionFile> {
    let roots = DiscoveryRoots::from_environment(include_remote).with_extra_dirs(extra_dirs.iter().cloned());
    discover_session_files(&roots, max_depth)
}
