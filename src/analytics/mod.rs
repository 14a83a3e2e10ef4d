//! Usage aggregation over parsed session summaries.
//!
//! This module provides:
//! - UTC day keys and calendar helpers ([`daykey`])
//! - Period buckets: today, this month, last month, last 30 days ([`periods`])
//! - A zero-filled daily series for the trailing window ([`rollup`])
//!
//! Sessions are bucketed by the day key of their file's modification time,
//! not by timestamps inside the log. All inputs are processed through
//! `BTreeMap`s, so the report does not depend on input order.

pub mod daykey;
pub mod periods;
pub mod rollup;

pub use daykey::*;
pub use periods::*;
pub use rollup::*;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::SessionFile;
use crate::model::SessionSummary;
use crate::tokens::ModelTables;

/// One discovered file and the digest of its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUsage {
    /// The file, with the modification time used for bucketing.
    pub file: SessionFile,
    /// Parsed digest.
    pub summary: SessionSummary,
}

/// Full usage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Day key the report was computed for.
    pub today: String,
    /// Today's bucket.
    pub today_stats: UsagePeriodStats,
    /// Current month to date.
    pub this_month: UsagePeriodStats,
    /// Previous calendar month.
    pub last_month: UsagePeriodStats,
    /// Rolling 30-day window.
    pub last_30_days: UsagePeriodStats,
    /// Per-day totals for the rolling window, oldest first.
    pub daily: Vec<DailyStats>,
    /// Files that fed the report.
    pub files_considered: usize,
}

impl UsageReport {
    /// The four buckets in display order.
    #[must_use]
    pub fn periods(&self) -> [&UsagePeriodStats; 4] {
        [&self.today_stats, &self.this_month, &self.last_month, &self.last_30_days]
    }
}

/// Buckets file summaries into reporting periods.
#[derive(Debug, Clone)]
pub struct UsageAggregator<'a> {
    tables: &'a ModelTables,
    today: NaiveDate,
}

impl<'a> UsageAggregator<'a> {
    /// Aggregator for the UTC day containing `now`.
    #[must_use]
    pub fn new(tables: &'a ModelTables, now: DateTime<Utc>) -> Self {
        Self {
            tables,
            today: now.date_naive(),
        }
    }

    /// The UTC date treated as "today".
    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    /// Compute the report for a set of files.
    ///
    /// A file lands in every period whose range contains its day key, so the
    /// buckets overlap (today is also in this month and the last 30 days).
    #[must_use]
    pub fn aggregate(&self, files: &[FileUsage]) -> UsageReport {
        let mut buckets: Vec<PeriodAccumulator> = Period::ALL
            .iter()
            .map(|period| PeriodAccumulator::new(*period, self.today))
            .collect();

        for usage in files {
            let day = usage.file.modified.date_naive();
            for bucket in buckets.iter_mut().filter(|b| b.contains(day)) {
                bucket.add(&usage.file.editor, &usage.summary);
            }
        }

        let mut finished = buckets
            .into_iter()
            .map(|b| b.finish(self.today, self.tables));

        let empty = |period| PeriodAccumulator::new(period, self.today).finish(self.today, self.tables);
        let today_stats = finished.next().unwrap_or_else(|| empty(Period::Today));
        let this_month = finished.next().unwrap_or_else(|| empty(Period::ThisMonth));
        let last_month = finished.next().unwrap_or_else(|| empty(Period::LastMonth));
        let last_30_days = finished.next().unwrap_or_else(|| empty(Period::Last30Days));

        debug!(
            files = files.len(),
            today_tokens = today_stats.total_tokens,
            month_tokens = this_month.total_tokens,
            "Aggregated usage"
        );

        UsageReport {
            today: date_key(self.today),
            today_stats,
            this_month,
            last_month,
            last_30_days,
            daily: daily_series(files, self.today, ROLLING_WINDOW_DAYS),
            files_considered: files.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::discovery::StorageLocation;
    use crate::model::ModelUsage;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    pub(crate) fn file_usage(name: &str, modified: DateTime<Utc>, tokens: u64, turns: u64) -> FileUsage {
        let mut summary = SessionSummary {
            tokens,
            interactions: turns,
            ..SessionSummary::default()
        };
        summary.model_usage.insert(
            "gpt-4o".to_string(),
            ModelUsage {
                input_tokens: tokens / 2,
                output_tokens: tokens - tokens / 2,
            },
        );
        FileUsage {
            file: SessionFile {
                path: PathBuf::from("/sessions").join(name),
                location: StorageLocation::Workspace,
                editor: "VS Code".to_string(),
                size: 1,
                modified,
            },
            summary,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_sessions_gives_zero_averages() {
        let tables = ModelTables::builtin();
        let report = UsageAggregator::new(&tables, now()).aggregate(&[]);
        for stats in report.periods() {
            assert_eq!(stats.sessions, 0);
            assert_eq!(stats.total_tokens, 0);
            assert!(stats.avg_interactions_per_session.abs() < f64::EPSILON);
            assert!(stats.avg_tokens_per_session.abs() < f64::EPSILON);
        }
        assert_eq!(report.daily.len(), 30);
    }

    #[test]
    fn test_files_bucket_by_modification_day() {
        let tables = ModelTables::builtin();
        let files = vec![
            file_usage("today.json", Utc.with_ymd_and_hms(2025, 3, 15, 1, 0, 0).unwrap(), 100, 4),
            file_usage("month.json", Utc.with_ymd_and_hms(2025, 3, 2, 1, 0, 0).unwrap(), 40, 2),
            file_usage("feb.json", Utc.with_ymd_and_hms(2025, 2, 20, 1, 0, 0).unwrap(), 10, 1),
            file_usage("jan.json", Utc.with_ymd_and_hms(2025, 1, 20, 1, 0, 0).unwrap(), 7, 1),
        ];

        let report = UsageAggregator::new(&tables, now()).aggregate(&files);

        assert_eq!(report.today_stats.total_tokens, 100);
        assert_eq!(report.today_stats.sessions, 1);
        assert!((report.today_stats.avg_interactions_per_session - 4.0).abs() < f64::EPSILON);

        assert_eq!(report.this_month.total_tokens, 140);
        assert_eq!(report.this_month.sessions, 2);
        assert!((report.this_month.avg_tokens_per_session - 70.0).abs() < f64::EPSILON);

        assert_eq!(report.last_month.total_tokens, 10);
        assert_eq!(report.last_30_days.total_tokens, 150);
        assert_eq!(report.last_30_days.editor_usage["VS Code"].sessions, 3);
    }

    #[test]
    fn test_model_usage_sums_to_total() {
        let tables = ModelTables::builtin();
        let files = vec![
            file_usage("a.json", now(), 33, 1),
            file_usage("b.json", now(), 17, 1),
        ];
        let report = UsageAggregator::new(&tables, now()).aggregate(&files);
        let by_model: u64 = report.today_stats.model_usage.values().map(ModelUsage::total).sum();
        assert_eq!(by_model, report.today_stats.total_tokens);
    }

    #[test]
    fn test_report_is_order_independent() {
        let tables = ModelTables::builtin();
        let mut files = vec![
            file_usage("a.json", now(), 33, 1),
            file_usage("b.json", Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(), 17, 3),
            file_usage("c.json", Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap(), 5, 2),
        ];
        let aggregator = UsageAggregator::new(&tables, now());
        let forward = aggregator.aggregate(&files);
        files.reverse();
        let backward = aggregator.aggregate(&files);

        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&backward).unwrap()
        );
    }

    #[test]
    fn test_projection_uses_elapsed_days() {
        let tables = ModelTables::builtin();
        let files = vec![file_usage("a.json", now(), 150, 1)];
        let report = UsageAggregator::new(&tables, now()).aggregate(&files);
        // 150 tokens over 15 elapsed days of March, 365-day year.
        assert!((report.this_month.projected_annual_tokens - 3650.0).abs() < 1e-9);
    }
}
