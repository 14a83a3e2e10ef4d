//! Stats command implementation.
//!
//! Refreshes usage data and prints the period buckets.

use tokio_util::sync::CancellationToken;

use crate::analytics::{Period, UsagePeriodStats};
use crate::api::UsageTracker;
use crate::cli::{Cli, OutputFormat, StatsArgs};
use crate::error::Result;
use crate::util::format_number;

use super::print_json;

/// Run the stats command.
pub async fn run(cli: &Cli, tracker: &UsageTracker, args: &StatsArgs, token: &CancellationToken) -> Result<()> {
    let outcome = tracker.refresh(chrono::Utc::now(), token).await?;
    let selected: Vec<&UsagePeriodStats> = outcome
        .report
        .periods()
        .into_iter()
        .filter(|stats| args.period.map_or(true, |p| stats.period == Period::from(p)))
        .collect();

    match cli.effective_output() {
        OutputFormat::Json => print_json(&selected)?,
        OutputFormat::Tsv => {
            println!("period\tstart\tend\ttokens\tthinking_tokens\tsessions\tinteractions\tavg_interactions\tcost_usd\tprojected_annual_tokens");
            for stats in selected {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.4}\t{:.0}",
                    stats.period.label(),
                    stats.start,
                    stats.end,
                    stats.total_tokens,
                    stats.thinking_tokens,
                    stats.sessions,
                    stats.interactions,
                    stats.avg_interactions_per_session,
                    stats.estimated_cost,
                    stats.projected_annual_tokens,
                );
            }
        }
        OutputFormat::Text => {
            println!("Chat Usage ({} files)", outcome.files.len());
            println!("==========");
            for stats in selected {
                println!();
                print_period(stats, args.top);
            }
            if outcome.failed > 0 {
                println!();
                println!("Skipped {} unreadable file(s); run with --log-level warn for details.", outcome.failed);
            }
        }
    }

    Ok(())
}

fn print_period(stats: &UsagePeriodStats, top: usize) {
    println!("{} ({} .. {})", stats.period, stats.start, stats.end);
    println!("  Tokens:       {:>14}", format_number(stats.total_tokens));
    if stats.thinking_tokens > 0 {
        println!("  Thinking:     {:>14}", format_number(stats.thinking_tokens));
    }
    println!("  Sessions:     {:>14}", format_number(stats.sessions));
    println!(
        "  Interactions: {:>14}  ({:.1} per session)",
        format_number(stats.interactions),
        stats.avg_interactions_per_session
    );
    println!("  Est. cost:    {:>14}", format!("${:.2}", stats.estimated_cost));
    println!(
        "  CO2: {:.1} g  Water: {:.2} L  Trees: {:.4}",
        stats.environmental.co2_grams, stats.environmental.water_liters, stats.environmental.tree_years
    );
    println!(
        "  Annual projection: {} tokens, ${:.2}",
        format_number(stats.projected_annual_tokens.round() as u64),
        stats.projected_annual_cost
    );

    if !stats.model_usage.is_empty() {
        println!("  Models:");
        for (model, usage) in &stats.model_usage {
            println!(
                "    {model}: {} in / {} out",
                format_number(usage.input_tokens),
                format_number(usage.output_tokens)
            );
        }
    }
    if !stats.editor_usage.is_empty() {
        println!("  Editors:");
        for (editor, usage) in &stats.editor_usage {
            println!("    {editor}: {} tokens, {} sessions", format_number(usage.tokens), usage.sessions);
        }
    }

    let analysis = &stats.usage_analysis;
    let modes = &analysis.mode_usage;
    if modes.total() > 0 {
        println!(
            "  Modes: ask {} / edit {} / agent {} / plan {} / custom {}",
            modes.ask, modes.edit, modes.agent, modes.plan, modes.custom_agent
        );
    }
    let tools = analysis.tool_calls.top(top);
    if !tools.is_empty() {
        println!("  Top tools:");
        for (tool, count) in tools {
            println!("    {tool}: {count}");
        }
    }
    if analysis.mcp_tools.total > 0 {
        let mut servers: Vec<(&String, &u64)> = analysis.mcp_tools.by_server.iter().collect();
        servers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        println!("  MCP calls: {}", analysis.mcp_tools.total);
        for (server, count) in servers.into_iter().take(top) {
            println!("    {server}: {count}");
        }
    }
    let context = analysis.context_references.total();
    if context > 0 {
        println!("  Context references: {context}");
    }
}
