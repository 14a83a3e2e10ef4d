//! Per-day rollups for the trailing window.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::daykey::{day_key, trailing_days};
use super::FileUsage;
use crate::model::ModelUsage;

/// Totals for one UTC day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Day key (`YYYY-MM-DD`).
    pub date: String,
    /// Input plus output tokens.
    pub tokens: u64,
    /// Sessions last modified that day.
    pub sessions: u64,
    /// Turns in those sessions.
    pub interactions: u64,
    /// Tokens per model.
    pub model_usage: BTreeMap<String, ModelUsage>,
    /// Tokens per editor.
    pub editor_tokens: BTreeMap<String, u64>,
}

/// Build a zero-filled daily series of `days` days ending at `today`.
///
/// Every day in the window is present, oldest first, whether or not any
/// session was modified on it. Files outside the window are ignored.
#[must_use]
pub fn daily_series(files: &[FileUsage], today: NaiveDate, days: u32) -> Vec<DailyStats> {
    let mut buckets: BTreeMap<String, DailyStats> = trailing_days(today, days)
        .into_iter()
        .map(|date| {
            (
                date.clone(),
                DailyStats {
                    date,
                    ..DailyStats::default()
                },
            )
        })
        .collect();

    for usage in files {
        let Some(day) = buckets.get_mut(&day_key(usage.file.modified)) else {
            continue;
        };
        let summary = &usage.summary;
        day.tokens += summary.tokens;
        day.sessions += 1;
        day.interactions += summary.interactions;
        for (model, model_usage) in &summary.model_usage {
            day.model_usage.entry(model.clone()).or_default().merge(model_usage);
        }
        *day.editor_tokens.entry(usage.file.editor.clone()).or_insert(0) += summary.tokens;
    }

    buckets.into_values().collect()
}
