//! Filesystem walk over the discovery roots.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::editor::editor_for_root;
use super::paths::{
    DiscoveryRoots, CHAT_SESSIONS_DIR, EMPTY_WINDOW_SESSIONS_DIR, EXTENSION_STORAGE_DIR,
    GLOBAL_STORAGE_DIR, WORKSPACE_STORAGE_DIR,
};
use super::{SessionFile, StorageLocation};
use crate::analytics::system_time_to_utc;

/// Extensions that can hold a session.
pub const SESSION_EXTENSIONS: &[&str] = &["json", "jsonl"];

/// Default recursion limit for generic scans.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Enumerate every non-empty session file under `roots`.
///
/// Missing roots contribute nothing and unreadable entries are skipped, so
/// this never fails. The result is sorted by path and holds each path once;
/// when a path is reachable from several roots the first category wins.
#[must_use]
pub fn discover_session_files(roots: &DiscoveryRoots, max_depth: usize) -> Vec<SessionFile> {
    let mut found: BTreeMap<PathBuf, SessionFile> = BTreeMap::new();
    let mut add = |root: &Path, path: PathBuf, location: StorageLocation| {
        if found.contains_key(&path) {
            return;
        }
        let editor = editor_for_root(root, &path, location);
        if let Some(file) = stat_session_file(&path, location, editor) {
            found.insert(path, file);
        }
    };

    for user_dir in &roots.editor_user_dirs {
        if !user_dir.is_dir() {
            continue;
        }
        trace!(root = %user_dir.display(), "Scanning editor user directory");

        // workspaceStorage/<hash>/chatSessions/<file>
        for path in walk_files(&user_dir.join(WORKSPACE_STORAGE_DIR), 3, 3) {
            let in_sessions_dir = path
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|name| name == CHAT_SESSIONS_DIR);
            if in_sessions_dir {
                add(user_dir.as_path(), path, StorageLocation::Workspace);
            }
        }

        let global = user_dir.join(GLOBAL_STORAGE_DIR);
        for path in walk_files(&global.join(EMPTY_WINDOW_SESSIONS_DIR), 1, 1) {
            add(user_dir.as_path(), path, StorageLocation::GlobalLegacy);
        }
        for path in walk_files(&global.join(EXTENSION_STORAGE_DIR), 1, max_depth) {
            add(user_dir.as_path(), path, StorageLocation::ExtensionGlobal);
        }
    }

    for dir in &roots.cli_agent_dirs {
        for path in walk_files(dir, 1, max_depth) {
            add(dir.as_path(), path, StorageLocation::CliAgent);
        }
    }
    for dir in &roots.incremental_agent_dirs {
        for path in walk_files(dir, 1, max_depth) {
            add(dir.as_path(), path, StorageLocation::IncrementalAgent);
        }
    }
    for dir in &roots.other_agent_dirs {
        for path in walk_files(dir, 1, max_depth) {
            add(dir.as_path(), path, StorageLocation::OtherAgent);
        }
    }

    debug!(files = found.len(), "Discovered session files");
    found.into_values().collect()
}

/// Session-extension files between `min_depth` and `max_depth` below `root`.
fn walk_files(root: &Path, min_depth: usize, max_depth: usize) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(root)
        .min_depth(min_depth)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| has_session_extension(path))
        .collect()
}

/// Whether `path` ends in `.json` or `.jsonl`.
#[must_use]
pub fn has_session_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SESSION_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Stat a candidate; `None` for zero-byte or vanished files.
fn stat_session_file(path: &Path, location: StorageLocation, editor: String) -> Option<SessionFile> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping file that cannot be stat'ed");
            return None;
        }
    };
    if metadata.len() == 0 {
        trace!(path = %path.display(), "Skipping empty file");
        return None;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Some(SessionFile {
        editor,
        path: absolute,
        location,
        size: metadata.len(),
        modified: metadata
            .modified()
            .map(system_time_to_utc)
            .unwrap_or_default(),
    })
}
