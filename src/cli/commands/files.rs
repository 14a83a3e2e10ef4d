//! Files command implementation.
//!
//! Lists discovered session files without parsing them.

use crate::api::UsageTracker;
use crate::cli::{Cli, FilesArgs, OutputFormat};
use crate::discovery::SessionFile;
use crate::error::Result;
use crate::util::format_bytes;

use super::print_json;

/// Run the files command.
pub async fn run(cli: &Cli, tracker: &UsageTracker, args: &FilesArgs) -> Result<()> {
    let mut files = tracker.discover_files().await?;
    if let Some(editor) = &args.editor {
        let needle = editor.to_lowercase();
        files.retain(|f| f.editor.to_lowercase().contains(&needle));
    }
    // Most recently modified first.
    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    if let Some(limit) = args.limit {
        files.truncate(limit);
    }

    match cli.effective_output() {
        OutputFormat::Json => print_json(&files)?,
        OutputFormat::Tsv => {
            println!("path\teditor\tlocation\tsize\tmodified");
            for file in &files {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    file.path.display(),
                    file.editor,
                    file.location,
                    file.size,
                    file.modified.to_rfc3339()
                );
            }
        }
        OutputFormat::Text => print_text(&files),
    }

    Ok(())
}

fn print_text(files: &[SessionFile]) {
    if files.is_empty() {
        println!("No session files found.");
        return;
    }
    for file in files {
        println!(
            "{}  {:<16} {:<18} {:>10}  {}",
            file.modified.format("%Y-%m-%d %H:%M"),
            file.editor,
            file.location.label(),
            format_bytes(file.size),
            file.path.display()
        );
    }
    let total: u64 = files.iter().map(|f| f.size).sum();
    println!();
    println!("{} file(s), {}", files.len(), format_bytes(total));
}
