//! Reporting periods and per-period statistics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::daykey::{date_key, days_in_year, month_start, previous_month, trailing_days};
use crate::model::{EditorUsage, ModelUsage, SessionSummary, UsageAnalysis};
use crate::tokens::{estimate_cost, EnvironmentalImpact, ModelTables};

/// Length of the rolling window.
pub const ROLLING_WINDOW_DAYS: u32 = 30;

/// A reporting period relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// The current UTC day.
    Today,
    /// The current calendar month up to today.
    ThisMonth,
    /// The whole previous calendar month.
    LastMonth,
    /// Today and the 29 days before it.
    Last30Days,
}

impl Period {
    /// All periods in report order.
    pub const ALL: [Self; 4] = [Self::Today, Self::ThisMonth, Self::LastMonth, Self::Last30Days];

    /// Inclusive date range of the period.
    #[must_use]
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Today => (today, today),
            Self::ThisMonth => (month_start(today), today),
            Self::LastMonth => previous_month(today),
            Self::Last30Days => {
                let keys = trailing_days(today, ROLLING_WINDOW_DAYS);
                let start = keys
                    .first()
                    .and_then(|k| super::daykey::parse_day_key(k))
                    .unwrap_or(today);
                (start, today)
            }
        }
    }

    /// Days of the period that have elapsed as of `today`.
    #[must_use]
    pub fn elapsed_days(&self, today: NaiveDate) -> u32 {
        let (start, end) = self.range(today);
        let end = end.min(today);
        if end < start {
            return 0;
        }
        (end - start).num_days() as u32 + 1
    }

    /// Display label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::ThisMonth => "This month",
            Self::LastMonth => "Last month",
            Self::Last30Days => "Last 30 days",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Project a period total onto a full year.
///
/// Returns 0 when no days have elapsed.
#[must_use]
pub fn annual_projection(period_total: f64, elapsed_days: u32, days_in_target_year: u32) -> f64 {
    if elapsed_days == 0 {
        return 0.0;
    }
    (period_total / f64::from(elapsed_days)) * f64::from(days_in_target_year)
}

/// Statistics for one period bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePeriodStats {
    /// Which period.
    pub period: Period,
    /// First day key of the range.
    pub start: String,
    /// Last day key of the range.
    pub end: String,
    /// Input plus output tokens.
    pub total_tokens: u64,
    /// Hidden reasoning tokens (not part of `total_tokens`).
    pub thinking_tokens: u64,
    /// Sessions in the bucket.
    pub sessions: u64,
    /// Turns in the bucket.
    pub interactions: u64,
    /// Turns per session, 0 for an empty bucket.
    pub avg_interactions_per_session: f64,
    /// Tokens per session, 0 for an empty bucket.
    pub avg_tokens_per_session: f64,
    /// Tokens per model.
    pub model_usage: BTreeMap<String, ModelUsage>,
    /// Tokens and sessions per editor.
    pub editor_usage: BTreeMap<String, EditorUsage>,
    /// Mode/tool/context rollup.
    pub usage_analysis: UsageAnalysis,
    /// Estimated USD cost.
    pub estimated_cost: f64,
    /// Environmental estimate.
    pub environmental: EnvironmentalImpact,
    /// Tokens projected over a year at this period's rate.
    pub projected_annual_tokens: f64,
    /// Cost projected over a year at this period's rate.
    pub projected_annual_cost: f64,
}

/// Running sums for one bucket; finished into [`UsagePeriodStats`].
#[derive(Debug, Clone)]
pub(crate) struct PeriodAccumulator {
    period: Period,
    start: NaiveDate,
    end: NaiveDate,
    total_tokens: u64,
    thinking_tokens: u64,
    sessions: u64,
    interactions: u64,
    model_usage: BTreeMap<String, ModelUsage>,
    editor_usage: BTreeMap<String, EditorUsage>,
    usage_analysis: UsageAnalysis,
}

impl PeriodAccumulator {
    pub(crate) fn new(period: Period, today: NaiveDate) -> Self {
        let (start, end) = period.range(today);
        Self {
            period,
            start,
            end,
            total_tokens: 0,
            thinking_tokens: 0,
            sessions: 0,
            interactions: 0,
            model_usage: BTreeMap::new(),
            editor_usage: BTreeMap::new(),
            usage_analysis: UsageAnalysis::default(),
        }
    }

    pub(crate) fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub(crate) fn add(&mut self, editor: &str, summary: &SessionSummary) {
        self.total_tokens += summary.tokens;
        self.thinking_tokens += summary.thinking_tokens;
        self.sessions += 1;
        self.interactions += summary.interactions;

        for (model, usage) in &summary.model_usage {
            self.model_usage.entry(model.clone()).or_default().merge(usage);
        }

        let editor_usage = self.editor_usage.entry(editor.to_string()).or_default();
        editor_usage.tokens += summary.tokens;
        editor_usage.sessions += 1;

        self.usage_analysis.merge(&summary.usage_analysis);
    }

    pub(crate) fn finish(self, today: NaiveDate, tables: &ModelTables) -> UsagePeriodStats {
        let (avg_interactions, avg_tokens) = if self.sessions == 0 {
            (0.0, 0.0)
        } else {
            (
                self.interactions as f64 / self.sessions as f64,
                self.total_tokens as f64 / self.sessions as f64,
            )
        };

        let estimated_cost = estimate_cost(&self.model_usage, tables);
        let elapsed = self.period.elapsed_days(today);
        let year_days = days_in_year(today.year());

        UsagePeriodStats {
            period: self.period,
            start: date_key(self.start),
            end: date_key(self.end),
            total_tokens: self.total_tokens,
            thinking_tokens: self.thinking_tokens,
            sessions: self.sessions,
            interactions: self.interactions,
            avg_interactions_per_session: avg_interactions,
            avg_tokens_per_session: avg_tokens,
            environmental: EnvironmentalImpact::from_tokens(self.total_tokens),
            projected_annual_tokens: annual_projection(self.total_tokens as f64, elapsed, year_days),
            projected_annual_cost: annual_projection(estimated_cost, elapsed, year_days),
            estimated_cost,
            model_usage: self.model_usage,
            editor_usage: self.editor_usage,
            usage_analysis: self.usage_analysis,
        }
    }
}
