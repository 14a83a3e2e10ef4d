//! Daily command implementation.

use tokio_util::sync::CancellationToken;

use crate::analytics::DailyStats;
use crate::api::UsageTracker;
use crate::cli::{Cli, DailyArgs, OutputFormat};
use crate::error::Result;
use crate::util::format_number;

use super::print_json;

/// Run the daily command.
pub async fn run(cli: &Cli, tracker: &UsageTracker, args: &DailyArgs, token: &CancellationToken) -> Result<()> {
    let outcome = tracker.refresh(chrono::Utc::now(), token).await?;
    let days: Vec<&DailyStats> = outcome
        .report
        .daily
        .iter()
        .filter(|day| !args.active_only || day.sessions > 0)
        .collect();

    match cli.effective_output() {
        OutputFormat::Json => print_json(&days)?,
        OutputFormat::Tsv => {
            println!("date\ttokens\tsessions\tinteractions");
            for day in days {
                println!("{}\t{}\t{}\t{}", day.date, day.tokens, day.sessions, day.interactions);
            }
        }
        OutputFormat::Text => {
            let peak = days.iter().map(|d| d.tokens).max().unwrap_or(0).max(1);
            println!("{:<10}  {:>12}  {:>8}  {:>12}", "Date", "Tokens", "Sessions", "Interactions");
            for day in days {
                let bar = "#".repeat(bar_width(day.tokens, peak));
                println!(
                    "{:<10}  {:>12}  {:>8}  {:>12}  {bar}",
                    day.date,
                    format_number(day.tokens),
                    day.sessions,
                    day.interactions
                );
            }
        }
    }

    Ok(())
}

/// Widest bar drawn for the peak day.
const BAR_WIDTH: u64 = 30;

/// Bar length for `tokens` relative to `peak`.
fn bar_width(tokens: u64, peak: u64) -> usize {
    let scaled = u128::from(tokens) * u128::from(BAR_WIDTH) / u128::from(peak.max(1));
    usize::try_from(scaled.min(u128::from(BAR_WIDTH))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_width_scales_to_peak() {
        assert_eq!(bar_width(0, 1), 0);
        assert_eq!(bar_width(50, 100), 15);
        assert_eq!(bar_width(100, 100), 30);
        assert_eq!(bar_width(u64::MAX, u64::MAX), 30);
        assert_eq!(bar_width(u64::MAX / 2, u64::MAX), 14);
    }
}
