//! High-level programmatic API for chat-tally.
//!
//! [`UsageTracker`] ties discovery, parsing, the session cache and
//! aggregation together behind a small async surface.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chat_tally::api::UsageTracker;
//! use chat_tally::config::Config;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> chat_tally::Result<()> {
//!     let tracker = UsageTracker::new(Config::load()?)?;
//!     let outcome = tracker.refresh(chrono::Utc::now(), &CancellationToken::new()).await?;
//!
//!     for period in outcome.report.periods() {
//!         println!("{}: {} tokens", period.period, period.total_tokens);
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::analytics::{system_time_to_utc, FileUsage, UsageAggregator, UsageReport};
use crate::cache::{CacheEntry, SessionCache};
use crate::config::Config;
use crate::discovery::{detect_editor, discover_session_files, editor_for_root, DiscoveryRoots, SessionFile, StorageLocation};
use crate::error::{Result, TallyError};
use crate::model::{ParsedSession, SessionFormat, SessionSummary};
use crate::parser::parse_session;
use crate::tokens::ModelTables;

/// Discovers, parses and aggregates session logs.
///
/// The cache is injected and shared; several trackers (or several refreshes
/// of one tracker) may use the same cache concurrently.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    config: Config,
    tables: Arc<ModelTables>,
    cache: Arc<SessionCache>,
    roots: DiscoveryRoots,
}

/// Result of one refresh pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    /// Aggregated periods and daily series.
    pub report: UsageReport,
    /// Per-file digests that fed the report.
    pub files: Vec<FileUsage>,
    /// Files answered from the cache.
    pub cache_hits: usize,
    /// Files parsed in this pass.
    pub parsed: usize,
    /// Files that could not be stat'ed, read or parsed in time.
    pub failed: usize,
}

/// Per-file detail for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFileDetails {
    /// Absolute path.
    pub path: PathBuf,
    /// Editor or tool that produced the file.
    pub editor: String,
    /// Storage category, when the file came from discovery.
    pub location: Option<StorageLocation>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Turn count.
    pub interactions: usize,
    /// Session title.
    pub title: Option<String>,
    /// Earliest timestamp in content.
    pub first_interaction: Option<DateTime<Utc>>,
    /// Latest timestamp in content.
    pub last_interaction: Option<DateTime<Utc>>,
    /// Detected schema variant.
    pub format: SessionFormat,
}

impl SessionFileDetails {
    /// Combine file metadata with its parsed contents.
    #[must_use]
    pub fn new(file: &SessionFile, session: &ParsedSession) -> Self {
        Self {
            path: file.path.clone(),
            editor: file.editor.clone(),
            location: Some(file.location),
            size: file.size,
            modified: file.modified,
            interactions: session.interactions(),
            title: session.title.clone(),
            first_interaction: session.first_interaction,
            last_interaction: session.last_interaction,
            format: session.format,
        }
    }
}

enum FileOutcome {
    Hit(FileUsage),
    Parsed(FileUsage),
    Failed,
}

impl UsageTracker {
    /// Tracker for the current user, with the configured cache loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let tables = Arc::new(config.load_tables()?);
        let cache = Arc::new(SessionCache::from_config(&config.cache));
        let roots = DiscoveryRoots::from_environment(config.scan.include_remote)
            .with_extra_dirs(config.scan.extra_dirs.iter().cloned());
        Ok(Self {
            config,
            tables,
            cache,
            roots,
        })
    }

    /// Tracker over explicit parts.
    #[must_use]
    pub fn with_parts(
        config: Config,
        tables: Arc<ModelTables>,
        cache: Arc<SessionCache>,
        roots: DiscoveryRoots,
    ) -> Self {
        Self {
            config,
            tables,
            cache,
            roots,
        }
    }

    /// Replace the discovery roots.
    #[must_use]
    pub fn with_roots(mut self, roots: DiscoveryRoots) -> Self {
        self.roots = roots;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Reference tables in use.
    #[must_use]
    pub fn tables(&self) -> &ModelTables {
        &self.tables
    }

    /// The shared session cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Directories searched for session files.
    #[must_use]
    pub const fn roots(&self) -> &DiscoveryRoots {
        &self.roots
    }

    /// Run discovery off the async executor.
    pub async fn discover_files(&self) -> Result<Vec<SessionFile>> {
        let roots = self.roots.clone();
        let max_depth = self.config.scan.max_depth;
        let files = tokio::task::spawn_blocking(move || discover_session_files(&roots, max_depth)).await?;
        debug!(files = files.len(), "Discovery finished");
        Ok(files)
    }

    /// Discover, parse (or reuse cached digests) and aggregate.
    ///
    /// `token` is checked after every file; a cancelled pass returns
    /// [`TallyError::Interrupted`]. Entries completed before cancellation
    /// stay in the cache. Only a full pass evicts vanished files and saves.
    pub async fn refresh(&self, now: DateTime<Utc>, token: &CancellationToken) -> Result<RefreshOutcome> {
        self.refresh_with_progress(now, token, |_| {}).await
    }

    /// [`refresh`](Self::refresh), calling `on_file` with the number of
    /// files finished so far after each one completes.
    #[instrument(skip_all)]
    pub async fn refresh_with_progress(
        &self,
        now: DateTime<Utc>,
        token: &CancellationToken,
        mut on_file: impl FnMut(usize),
    ) -> Result<RefreshOutcome> {
        if token.is_cancelled() {
            return Err(TallyError::Interrupted);
        }

        let discovered = self.discover_files().await?;
        let timeout = self.config.scan.parse_timeout()?;
        let concurrency = self.config.scan.concurrency.max(1);
        let seen: HashSet<PathBuf> = discovered.iter().map(|f| f.path.clone()).collect();

        let mut outcomes = stream::iter(discovered)
            .map(|file| process_file(file, Arc::clone(&self.tables), Arc::clone(&self.cache), timeout))
            .buffer_unordered(concurrency);

        let mut files = Vec::with_capacity(seen.len());
        let (mut cache_hits, mut parsed, mut failed) = (0, 0, 0);
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                FileOutcome::Hit(usage) => {
                    cache_hits += 1;
                    files.push(usage);
                }
                FileOutcome::Parsed(usage) => {
                    parsed += 1;
                    files.push(usage);
                }
                FileOutcome::Failed => failed += 1,
            }
            on_file(cache_hits + parsed + failed);
            if token.is_cancelled() {
                info!(completed = files.len(), "Refresh cancelled");
                return Err(TallyError::Interrupted);
            }
        }

        // Completion order varies with fan-out.
        files.sort_by(|a, b| a.file.path.cmp(&b.file.path));

        let evicted = self.cache.evict_stale(&seen);
        if self.cache.is_dirty() {
            if let Err(e) = self.cache.save_to_disk() {
                warn!(error = %e, "Failed to persist session cache");
            }
        }

        let report = UsageAggregator::new(&self.tables, now).aggregate(&files);
        info!(
            files = files.len(),
            cache_hits,
            parsed,
            failed,
            evicted,
            "Refresh complete"
        );

        Ok(RefreshOutcome {
            report,
            files,
            cache_hits,
            parsed,
            failed,
        })
    }

    /// Parse one file.
    ///
    /// A missing path or a directory is an error. File contents never are:
    /// unreadable data yields an empty session.
    pub async fn parse_file(&self, path: &Path) -> Result<ParsedSession> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| TallyError::from_io_at(path, e))?;
        if !metadata.is_file() {
            return Err(TallyError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| TallyError::from_io_at(path, e))?;

        let timeout = self.config.scan.parse_timeout()?;
        parse_blocking(content, path.to_path_buf(), Arc::clone(&self.tables), timeout).await
    }

    /// Parse one file and describe it.
    pub async fn describe_file(&self, path: &Path) -> Result<(SessionFileDetails, ParsedSession)> {
        let session = self.parse_file(path).await?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| TallyError::from_io_at(path, e))?;
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let located = self.roots.locate(&path);

        let file = SessionFile {
            editor: located.map_or_else(
                || detect_editor(&path),
                |(root, location)| editor_for_root(root, &path, location),
            ),
            location: located.map_or(StorageLocation::OtherAgent, |(_, location)| location),
            size: metadata.len(),
            modified: metadata.modified().map(system_time_to_utc).unwrap_or_default(),
            path,
        };
        let mut details = SessionFileDetails::new(&file, &session);
        if located.is_none() {
            details.location = None;
        }
        Ok((details, session))
    }
}

/// Stat, consult the cache, and parse on a miss.
async fn process_file(
    mut file: SessionFile,
    tables: Arc<ModelTables>,
    cache: Arc<SessionCache>,
    timeout: Duration,
) -> FileOutcome {
    let metadata = match tokio::fs::metadata(&file.path).await {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "Session file vanished before parsing");
            return FileOutcome::Failed;
        }
    };
    file.size = metadata.len();
    if let Ok(modified) = metadata.modified() {
        file.modified = system_time_to_utc(modified);
    }
    let mtime_ms = file.modified.timestamp_millis();

    if let Some(entry) = cache.get(&file.path, mtime_ms) {
        return FileOutcome::Hit(FileUsage {
            file,
            summary: entry.summary,
        });
    }

    let content = match tokio::fs::read(&file.path).await {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "Failed to read session file");
            return FileOutcome::Failed;
        }
    };

    let default_model = tables.default_model().to_string();
    let session = match parse_blocking(content, file.path.clone(), tables, timeout).await {
        Ok(session) => session,
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "Skipping session file");
            return FileOutcome::Failed;
        }
    };

    let summary = SessionSummary::from_parsed(&session, &default_model);
    cache.put(
        file.path.clone(),
        CacheEntry {
            mtime_ms,
            size: file.size,
            summary: summary.clone(),
        },
    );
    FileOutcome::Parsed(FileUsage { file, summary })
}

/// Parse on the blocking pool, bounded by `timeout`.
async fn parse_blocking(
    content: Vec<u8>,
    path: PathBuf,
    tables: Arc<ModelTables>,
    timeout: Duration,
) -> Result<ParsedSession> {
    let task = tokio::task::spawn_blocking(move || parse_session(&content, &path, &tables));
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => Ok(joined?),
        Err(_) => Err(TallyError::Timeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker(root: &Path) -> UsageTracker {
        let roots = DiscoveryRoots {
            other_agent_dirs: vec![root.to_path_buf()],
            ..DiscoveryRoots::default()
        };
        UsageTracker::with_parts(
            Config::default(),
            Arc::new(ModelTables::builtin()),
            Arc::new(SessionCache::new(10, 2)),
            roots,
        )
    }

    const HELLO: &str = r#"{"requests":[{"message":{"parts":[{"text":"hello"}]},"response":[{"value":"world"}]}]}"#;

    #[tokio::test]
    async fn test_parse_file_rejects_missing_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(dir.path());

        let missing = tracker.parse_file(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(TallyError::FileNotFound { .. })));

        let directory = tracker.parse_file(dir.path()).await;
        assert!(matches!(directory, Err(TallyError::NotAFile { .. })));
    }

    #[tokio::test]
    async fn test_parse_file_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.json");
        std::fs::write(&path, b"\x00\xff not json").unwrap();

        let session = tracker(dir.path()).parse_file(&path).await.unwrap();
        assert_eq!(session.turns.len(), 0);
        assert_eq!(session.format, SessionFormat::Unknown);
    }

    #[tokio::test]
    async fn test_refresh_uses_cache_on_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), HELLO).unwrap();
        std::fs::write(dir.path().join("b.json"), HELLO).unwrap();
        let tracker = tracker(dir.path());
        let token = CancellationToken::new();

        let first = tracker.refresh(Utc::now(), &token).await.unwrap();
        assert_eq!(first.parsed, 2);
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first.report.today_stats.total_tokens, 8);

        let second = tracker.refresh(Utc::now(), &token).await.unwrap();
        assert_eq!(second.parsed, 0);
        assert_eq!(second.cache_hits, 2);
        assert_eq!(second.report, first.report);
    }

    #[tokio::test]
    async fn test_refresh_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = tracker(dir.path()).refresh(Utc::now(), &token).await;
        assert!(matches!(result, Err(TallyError::Interrupted)));
    }

    #[tokio::test]
    async fn test_describe_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, HELLO).unwrap();

        let (details, session) = tracker(dir.path()).describe_file(&path).await.unwrap();
        assert_eq!(details.interactions, 1);
        assert_eq!(details.format, SessionFormat::Monolithic);
        assert_eq!(details.size, HELLO.len() as u64);
        assert_eq!(details.location, Some(StorageLocation::OtherAgent));
        assert_eq!(details.editor, crate::discovery::UNKNOWN_EDITOR);
        assert_eq!(session.total_tokens(), 4);

        let outside = tempfile::tempdir().unwrap();
        let stray = outside.path().join("s.json");
        std::fs::write(&stray, HELLO).unwrap();
        let (details, _) = tracker(dir.path()).describe_file(&stray).await.unwrap();
        assert!(details.location.is_none());
        assert_eq!(details.path, stray);
    }
}
