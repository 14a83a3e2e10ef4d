//! Session cache keyed by path and modification time.
//!
//! This module memoises per-file parse digests:
//! - An entry is valid only while the file's mtime equals the stored mtime
//! - Bounded size with batch eviction of the oldest insertions
//! - Removal of entries whose file is gone
//! - JSON persistence that tolerates a missing or corrupt file
//!
//! The cache is safe to share across tasks. Writes take a short exclusive
//! lock and replace a whole entry at once, so readers never see a partial
//! entry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{Result, TallyError};
use crate::model::SessionSummary;
use crate::util::atomic_write;

/// Entries kept before eviction is considered.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Entries removed per eviction pass.
pub const DEFAULT_EVICT_BATCH: usize = 100;

/// One cached digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File mtime in milliseconds since the Unix epoch when parsed.
    pub mtime_ms: i64,
    /// File size in bytes when parsed.
    #[serde(default)]
    pub size: u64,
    /// Parse digest.
    pub summary: SessionSummary,
}

/// Persisted entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    path: PathBuf,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Persisted cache blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: Vec<PersistedEntry>,
}

impl PersistedCache {
    const CURRENT_VERSION: u32 = 1;
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries held.
    pub entry_count: usize,
    /// Soft capacity.
    pub max_entries: usize,
    /// Entries dropped per eviction.
    pub evict_batch: usize,
}

impl CacheStats {
    /// Fill level as a percentage of the soft capacity.
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.max_entries == 0 {
            return 0.0;
        }
        (self.entry_count as f64 / self.max_entries as f64) * 100.0
    }
}

/// Thread-safe session cache.
pub struct SessionCache {
    entries: RwLock<IndexMap<PathBuf, CacheEntry>>,
    max_entries: usize,
    evict_batch: usize,
    path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl SessionCache {
    /// In-memory cache with the given bounds.
    #[must_use]
    pub fn new(max_entries: usize, evict_batch: usize) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            max_entries,
            evict_batch: evict_batch.max(1),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Cache persisted at `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build from configuration and load any persisted state.
    ///
    /// A disabled cache is in-memory only and never touches disk.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::new(config.max_entries, config.evict_batch);
        if !config.enabled {
            return cache;
        }
        let cache = cache.with_path(config.resolved_path());
        cache.load_from_disk();
        cache
    }

    /// Where the cache is persisted, if anywhere.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached entry for `path`, only if it was stored for `mtime_ms`.
    #[must_use]
    pub fn get(&self, path: &Path, mtime_ms: i64) -> Option<CacheEntry> {
        let guard = self.entries.read();
        guard
            .get(path)
            .filter(|entry| entry.mtime_ms == mtime_ms)
            .cloned()
    }

    /// Store an entry, replacing any previous one for `path`.
    ///
    /// A replaced entry moves to the newest position. Crossing the high-water
    /// mark (`max_entries + evict_batch`) drops the oldest `evict_batch`.
    pub fn put(&self, path: impl Into<PathBuf>, entry: CacheEntry) {
        let mut guard = self.entries.write();
        let path = path.into();
        guard.shift_remove(&path);
        guard.insert(path, entry);

        if guard.len() > self.max_entries + self.evict_batch {
            let batch = self.evict_batch.min(guard.len());
            guard.drain(..batch);
            debug!(evicted = batch, remaining = guard.len(), "Evicted oldest cache entries");
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Drop entries whose path is not in `existing`. Returns how many were dropped.
    pub fn evict_stale(&self, existing: &HashSet<PathBuf>) -> usize {
        self.retain(|path| existing.contains(path))
    }

    /// Drop entries whose file no longer exists on disk.
    pub fn evict_missing_files(&self) -> usize {
        self.retain(|path| path.exists())
    }

    fn retain(&self, mut keep: impl FnMut(&Path) -> bool) -> usize {
        let mut guard = self.entries.write();
        let before = guard.len();
        guard.retain(|path, _| keep(path.as_path()));
        let removed = before - guard.len();
        if removed > 0 {
            self.dirty.store(true, Ordering::Release);
            debug!(removed, "Removed stale cache entries");
        }
        removed
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.dirty.store(true, Ordering::Release);
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.len(),
            max_entries: self.max_entries,
            evict_batch: self.evict_batch,
        }
    }

    /// Whether there are changes not yet saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Load persisted entries, replacing the in-memory state.
    ///
    /// A missing, unreadable, corrupt or incompatible file leaves the cache
    /// empty. Returns the number of entries loaded.
    pub fn load_from_disk(&self) -> usize {
        let Some(path) = self.path.as_deref() else {
            return 0;
        };

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No persisted cache");
                return 0;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read cache, starting empty");
                return 0;
            }
        };

        let persisted: PersistedCache = match serde_json::from_slice(&content) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache, starting empty");
                return 0;
            }
        };
        if persisted.version != PersistedCache::CURRENT_VERSION {
            info!(
                found = persisted.version,
                expected = PersistedCache::CURRENT_VERSION,
                "Cache version changed, starting empty"
            );
            return 0;
        }

        let mut guard = self.entries.write();
        guard.clear();
        for item in persisted.entries {
            guard.insert(item.path, item.entry);
        }
        let loaded = guard.len();
        self.dirty.store(false, Ordering::Release);
        debug!(path = %path.display(), entries = loaded, "Loaded cache");
        loaded
    }

    /// Persist all entries atomically. A cache without a path is a no-op.
    pub fn save_to_disk(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let persisted = {
            let guard = self.entries.read();
            PersistedCache {
                version: PersistedCache::CURRENT_VERSION,
                entries: guard
                    .iter()
                    .map(|(path, entry)| PersistedEntry {
                        path: path.clone(),
                        entry: entry.clone(),
                    })
                    .collect(),
            }
        };

        let json = serde_json::to_vec(&persisted).map_err(|e| TallyError::SerializationError {
            context: "Failed to serialize session cache".to_string(),
            source: e,
        })?;
        atomic_write(path, &json)?;
        self.dirty.store(false, Ordering::Release);
        debug!(path = %path.display(), entries = persisted.entries.len(), "Saved cache");
        Ok(())
    }

    /// Delete the persisted file and clear memory.
    pub fn purge(&self) -> Result<()> {
        self.clear();
        if let Some(path) = self.path.as_deref() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(TallyError::from_io_at(path, e)),
            }
        }
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_EVICT_BATCH)
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .field("path", &self.path)
            .finish()
    }
}
