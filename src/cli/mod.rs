//! Command-line interface for chat-tally.
//!
//! Provides scriptable access to chat usage data with five commands:
//! - `stats`: Period buckets (today, this month, last month, last 30 days)
//! - `files`: Discovered session files
//! - `show`: One session file in detail
//! - `daily`: Per-day totals for the last 30 days
//! - `cache`: Inspect or clear the session cache

mod commands;

pub use commands::*;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::UsageTracker;
use crate::config::Config;
use crate::error::{Result, TallyError};

/// Token usage tally for editor chat sessions.
#[derive(Debug, Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for structured data.
    #[arg(short = 'o', long, global = true, default_value = "text", env = "TALLY_OUTPUT")]
    pub output: OutputFormat,

    /// Output as JSON (shorthand for -o json).
    #[arg(long, global = true, env = "TALLY_JSON")]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", env = "TALLY_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log format (text, json, compact, pretty).
    #[arg(long, global = true, default_value = "text", env = "TALLY_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to custom configuration file.
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Neither read nor write the persisted session cache.
    #[arg(long, global = true, env = "TALLY_NO_CACHE")]
    pub no_cache: bool,
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    #[default]
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// All of the above plus debug messages.
    Debug,
    /// All messages including trace-level details.
    Trace,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// Structured JSON format for machine consumption.
    Json,
    /// Compact single-line format.
    Compact,
    /// Pretty format with full details.
    Pretty,
}

impl LogLevel {
    /// Convert to tracing filter level.
    #[must_use]
    pub fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Tab-separated values.
    Tsv,
}

impl Cli {
    /// Get effective output format.
    #[must_use]
    pub fn effective_output(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.output
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show usage per period.
    #[command(alias = "stat")]
    Stats(StatsArgs),

    /// List discovered session files.
    #[command(alias = "ls")]
    Files(FilesArgs),

    /// Parse one session file and show its details.
    #[command(alias = "info")]
    Show(ShowArgs),

    /// Show per-day totals.
    Daily(DailyArgs),

    /// Manage the session cache.
    Cache(CacheArgs),
}

/// Arguments for the stats command.
#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Only show one period.
    #[arg(short = 'p', long)]
    pub period: Option<PeriodArg>,

    /// Number of tools and MCP servers listed per period.
    #[arg(long, default_value = "5")]
    pub top: usize,
}

/// Period selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodArg {
    /// Today (UTC).
    Today,
    /// This calendar month.
    ThisMonth,
    /// Previous calendar month.
    LastMonth,
    /// Rolling 30 days.
    Last30Days,
}

impl From<PeriodArg> for crate::analytics::Period {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Today => Self::Today,
            PeriodArg::ThisMonth => Self::ThisMonth,
            PeriodArg::LastMonth => Self::LastMonth,
            PeriodArg::Last30Days => Self::Last30Days,
        }
    }
}

/// Arguments for the files command.
#[derive(Debug, Parser)]
pub struct FilesArgs {
    /// Only files from this editor (case-insensitive substring).
    #[arg(short = 'e', long)]
    pub editor: Option<String>,

    /// Maximum number of results.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Session file to parse.
    pub path: PathBuf,

    /// Also print every turn.
    #[arg(long)]
    pub turns: bool,
}

/// Arguments for the daily command.
#[derive(Debug, Parser)]
pub struct DailyArgs {
    /// Hide days without sessions.
    #[arg(long)]
    pub active_only: bool,
}

/// Arguments for the cache command.
#[derive(Debug, Parser)]
pub struct CacheArgs {
    /// Cache action.
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Show cache statistics.
    Stats,
    /// Remove every entry and the persisted file.
    Clear,
    /// Drop entries for files that no longer exist.
    Prune,
}

/// Initialize tracing/logging based on CLI options.
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{
        fmt::{self, format::FmtSpan},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_filter_string()));

    let result = match cli.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
}

/// Load the configuration named on the command line, or the default one.
///
/// A broken file is reported and replaced by defaults.
fn load_config(cli: &Cli) -> Config {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load configuration, using defaults");
        eprintln!("Warning: {e}; using default configuration");
        Config::default()
    });
    if cli.no_cache {
        config.cache.enabled = false;
    }
    config
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = load_config(&cli);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| TallyError::io("Failed to start async runtime", e))?;

    runtime.block_on(async {
        let tracker = UsageTracker::new(config)?;
        let token = CancellationToken::new();
        cancel_on_interrupt(&token);

        match &cli.command {
            Commands::Stats(args) => commands::stats::run(&cli, &tracker, args, &token).await,
            Commands::Files(args) => commands::files::run(&cli, &tracker, args).await,
            Commands::Show(args) => commands::show::run(&cli, &tracker, args).await,
            Commands::Daily(args) => commands::daily::run(&cli, &tracker, args, &token).await,
            Commands::Cache(args) => commands::cache::run(&cli, &tracker, args),
        }
    })
}
