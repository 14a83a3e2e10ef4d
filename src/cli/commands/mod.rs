//! CLI command implementations.
//!
//! Each command is implemented in its own module with a `run` function
//! that handles the command logic.

pub mod cache;
pub mod daily;
pub mod files;
pub mod show;
pub mod stats;

use serde::Serialize;

use crate::error::Result;

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format an optional timestamp for text output.
#[must_use]
pub fn format_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
