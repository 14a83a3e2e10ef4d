//! chat-tally: token usage accounting for editor chat session logs.
//!
//! Editors with an AI chat panel, and the companion CLI agent, write every
//! conversation to disk in one of three JSON shapes. This crate finds those
//! files, parses each into a normalised session, estimates token counts per
//! model, and aggregates them into daily and monthly statistics.
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
//!     let tracker = UsageTracker::new(Config::default())?;
//!     let outcome = tracker.refresh(chrono::Utc::now(), &CancellationToken::new()).await?;
//!     println!("today: {} tokens", outcome.report.today_stats.total_tokens);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`discovery`]: Locating session files across editors and platforms
//! - [`parser`]: Format detection and the three session parsers
//! - [`tokens`]: Reference tables, token estimation and cost
//! - [`model`]: Parsed sessions, turns and usage tallies
//! - [`analytics`]: Day keys, period buckets and the daily series
//! - [`cache`]: Per-file digests keyed by path and modification time
//! - [`api`]: Async orchestration over all of the above
//! - [`cli`]: Command-line interface
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod parser;
pub mod tokens;
pub mod util;

// Re-export commonly used types at the crate root
pub use error::{Result, TallyError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analytics::{Period, UsageAggregator, UsagePeriodStats, UsageReport};
    pub use crate::api::{RefreshOutcome, SessionFileDetails, UsageTracker};
    pub use crate::cache::SessionCache;
    pub use crate::config::Config;
    pub use crate::discovery::{SessionFile, StorageLocation};
    pub use crate::error::{Result, TallyError};
    pub use crate::model::{ChatTurn, ParsedSession, SessionFormat};
    pub use crate::parser::parse_session;
    pub use crate::tokens::ModelTables;
}
