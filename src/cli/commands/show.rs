//! Show command implementation.
//!
//! Parses a single session file and prints what was found in it.

use serde::Serialize;

use crate::api::{SessionFileDetails, UsageTracker};
use crate::cli::{Cli, OutputFormat, ShowArgs};
use crate::error::Result;
use crate::model::{ChatTurn, ParsedSession};
use crate::util::{format_bytes, format_number};

use super::{format_time, print_json};

/// JSON shape of the show command.
#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    details: &'a SessionFileDetails,
    input_tokens: u64,
    output_tokens: u64,
    thinking_tokens: u64,
    warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    turns: Option<&'a [ChatTurn]>,
}

/// Run the show command.
pub async fn run(cli: &Cli, tracker: &UsageTracker, args: &ShowArgs) -> Result<()> {
    let (details, session) = tracker.describe_file(&args.path).await?;

    match cli.effective_output() {
        OutputFormat::Json => print_json(&ShowOutput {
            details: &details,
            input_tokens: session.total_input_tokens,
            output_tokens: session.total_output_tokens,
            thinking_tokens: session.total_thinking_tokens,
            warnings: session.warnings,
            turns: args.turns.then_some(session.turns.as_slice()),
        })?,
        OutputFormat::Tsv => {
            println!("metric\tvalue");
            println!("format\t{}", details.format);
            println!("interactions\t{}", details.interactions);
            println!("input_tokens\t{}", session.total_input_tokens);
            println!("output_tokens\t{}", session.total_output_tokens);
            println!("thinking_tokens\t{}", session.total_thinking_tokens);
            println!("warnings\t{}", session.warnings);
        }
        OutputFormat::Text => print_text(&details, &session, args.turns),
    }

    Ok(())
}

fn print_text(details: &SessionFileDetails, session: &ParsedSession, with_turns: bool) {
    println!("{}", details.path.display());
    println!("  Title:        {}", details.title.as_deref().unwrap_or("-"));
    println!("  Format:       {}", details.format);
    println!("  Editor:       {}", details.editor);
    println!("  Size:         {}", format_bytes(details.size));
    println!("  Modified:     {}", format_time(Some(details.modified)));
    println!("  First:        {}", format_time(details.first_interaction));
    println!("  Last:         {}", format_time(details.last_interaction));
    println!("  Interactions: {}", details.interactions);
    println!(
        "  Tokens:       {} in / {} out / {} thinking",
        format_number(session.total_input_tokens),
        format_number(session.total_output_tokens),
        format_number(session.total_thinking_tokens)
    );
    if session.warnings > 0 {
        println!("  Warnings:     {}", session.warnings);
    }

    if with_turns {
        for turn in &session.turns {
            println!();
            println!(
                "#{} [{}] {} ({} in / {} out)",
                turn.turn_number,
                turn.mode.as_str(),
                turn.model.as_deref().unwrap_or("-"),
                turn.input_tokens_estimate,
                turn.output_tokens_estimate
            );
            println!("  > {}", preview(&turn.user_message));
            println!("  < {}", preview(&turn.assistant_response));
            for call in &turn.tool_calls {
                println!("  tool: {}", call.tool_name);
            }
        }
    }
}

/// First line of `text`, cut to 80 characters.
fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > 80 {
        let cut: String = line.chars().take(77).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_by_chars() {
        assert_eq!(preview("short\nsecond line"), "short");
        let long = "é".repeat(100);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), 80);
        assert!(cut.ends_with("..."));
    }
}
