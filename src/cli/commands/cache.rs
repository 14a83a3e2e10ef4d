//! Cache command implementation.
//!
//! Manages the persisted session digest cache.

use crate::api::UsageTracker;
use crate::cli::{CacheAction, CacheArgs, Cli, OutputFormat};
use crate::error::Result;

use super::print_json;

/// Run the cache command.
pub fn run(cli: &Cli, tracker: &UsageTracker, args: &CacheArgs) -> Result<()> {
    match args.action {
        CacheAction::Stats => show_stats(cli, tracker),
        CacheAction::Clear => clear_cache(tracker),
        CacheAction::Prune => prune_cache(tracker),
    }
}

/// Show cache statistics.
fn show_stats(cli: &Cli, tracker: &UsageTracker) -> Result<()> {
    let cache = tracker.cache();
    let stats = cache.stats();

    if cli.effective_output() == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "path": cache.path(),
            "entries": stats.entry_count,
            "max_entries": stats.max_entries,
            "evict_batch": stats.evict_batch,
        }));
    }

    println!("Cache Status");
    println!("============");
    match cache.path() {
        Some(path) => println!("File: {}", path.display()),
        None => println!("File: (in-memory only)"),
    }
    println!(
        "Entries: {} / {} ({:.1}%)",
        stats.entry_count,
        stats.max_entries,
        stats.usage_percent()
    );
    println!("Eviction batch: {}", stats.evict_batch);

    Ok(())
}

/// Clear all cached data.
fn clear_cache(tracker: &UsageTracker) -> Result<()> {
    let cache = tracker.cache();
    let before = cache.len();
    cache.purge()?;
    println!("Cleared {before} entries");
    Ok(())
}

/// Drop entries whose session file is gone, then persist.
fn prune_cache(tracker: &UsageTracker) -> Result<()> {
    let cache = tracker.cache();
    let removed = cache.evict_missing_files();
    if cache.is_dirty() {
        cache.save_to_disk()?;
    }
    println!("Pruned {removed} entries ({} remaining)", cache.len());
    Ok(())
}
