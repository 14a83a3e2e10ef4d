//! Configuration management for chat-tally.
//!
//! Handles:
//! - Scan settings (depth, fan-out, per-file timeout, extra directories)
//! - Session cache settings
//! - Reference table overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_EVICT_BATCH, DEFAULT_MAX_ENTRIES};
use crate::discovery::DEFAULT_MAX_DEPTH;
use crate::error::{Result, TallyError};
use crate::tokens::ModelTables;
use crate::util::atomic_write;

/// Directory name used under the OS config and cache directories.
pub const APP_DIR_NAME: &str = "chat-tally";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Discovery and parsing.
    #[serde(default)]
    pub scan: ScanConfig,
    /// Session cache.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Reference tables.
    #[serde(default)]
    pub tables: TablesConfig,
}

impl Config {
    /// Load configuration from the default location, or defaults if there is none.
    pub fn load() -> Result<Self> {
        let config_path = default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TallyError::io(format!("Failed to read config file: {}", path.display()), e))?;

        let config: Self = toml::from_str(&content).map_err(|e| TallyError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| TallyError::InvalidConfig {
            message: format!("Failed to serialize config: {e}"),
        })?;
        atomic_write(path, content.as_bytes())
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.scan.concurrency == 0 {
            return Err(TallyError::InvalidConfig {
                message: "scan.concurrency must be at least 1".to_string(),
            });
        }
        if self.scan.max_depth == 0 {
            return Err(TallyError::InvalidConfig {
                message: "scan.max_depth must be at least 1".to_string(),
            });
        }
        self.scan.parse_timeout()?;
        Ok(())
    }

    /// Load the reference tables, applying any overrides.
    pub fn load_tables(&self) -> Result<ModelTables> {
        ModelTables::load(
            self.tables.token_ratios.as_deref(),
            self.tables.pricing.as_deref(),
            self.tables.default_model.as_deref(),
        )
    }
}

/// Discovery and parsing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Recursion limit for generic directory scans.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Files processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-file parse time limit, e.g. `"30s"`.
    #[serde(default = "default_parse_timeout")]
    pub parse_timeout: String,
    /// Extra directories scanned as other-agent storage.
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
    /// Include remote/server data directories.
    #[serde(default = "default_true")]
    pub include_remote: bool,
}

impl ScanConfig {
    /// The parse timeout as a duration.
    pub fn parse_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.parse_timeout).map_err(|e| TallyError::InvalidConfig {
            message: format!("scan.parse_timeout '{}': {e}", self.parse_timeout),
        })
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: default_concurrency(),
            parse_timeout: default_parse_timeout(),
            extra_dirs: Vec::new(),
            include_remote: true,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable persistence.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache file; defaults under the OS cache directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entries kept before eviction.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Entries removed per eviction.
    #[serde(default = "default_evict_batch")]
    pub evict_batch: usize,
}

impl CacheConfig {
    /// Configured path, or the default one.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_cache_path)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_entries: DEFAULT_MAX_ENTRIES,
            evict_batch: DEFAULT_EVICT_BATCH,
        }
    }
}

/// Reference table overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Replacement token ratio table (JSON).
    #[serde(default)]
    pub token_ratios: Option<PathBuf>,
    /// Replacement pricing table (JSON).
    #[serde(default)]
    pub pricing: Option<PathBuf>,
    /// Model assumed when a record names none.
    #[serde(default)]
    pub default_model: Option<String>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_concurrency() -> usize {
    8
}

fn default_parse_timeout() -> String {
    "30s".to_string()
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_evict_batch() -> usize {
    DEFAULT_EVICT_BATCH
}

/// Get the default configuration path.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| TallyError::InvalidConfig {
        message: "cannot determine the configuration directory".to_string(),
    })?;
    Ok(config_dir.join(APP_DIR_NAME).join("config.toml"))
}

/// Default cache file path (falls back to the working directory).
#[must_use]
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("session-cache.json")
}
