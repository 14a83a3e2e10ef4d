//! UTC day keys (`YYYY-MM-DD`) and calendar helpers used for bucketing.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Format of a day key.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Day key of an instant, in UTC.
#[must_use]
pub fn day_key(ts: DateTime<Utc>) -> String {
    ts.format(DAY_KEY_FORMAT).to_string()
}

/// Day key of a calendar date.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

/// Parse a day key back into a date.
#[must_use]
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()
}

/// Every day key from `start` to `end`, inclusive. Empty when `start > end`.
#[must_use]
pub fn day_range(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(date_key)
        .collect()
}

/// The `days` day keys ending at `end` (inclusive), oldest first.
#[must_use]
pub fn trailing_days(end: NaiveDate, days: u32) -> Vec<String> {
    if days == 0 {
        return Vec::new();
    }
    let start = end - Duration::days(i64::from(days) - 1);
    day_range(start, end)
}

/// First day of the month containing `date`.
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month before the one containing `date`.
#[must_use]
pub fn previous_month(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let this_start = month_start(date);
    let last_end = this_start.pred_opt().unwrap_or(this_start);
    (month_start(last_end), last_end)
}

/// Number of days in `year`.
#[must_use]
pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Convert a filesystem timestamp to UTC.
#[must_use]
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_key_is_utc() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();
        assert_eq!(day_key(ts), "2025-03-09");
        assert_eq!(parse_day_key("2025-03-09"), Some(date(2025, 3, 9)));
        assert_eq!(parse_day_key("03/09/2025"), None);
    }

    #[test]
    fn test_day_range_inclusive() {
        let keys = day_range(date(2025, 2, 27), date(2025, 3, 2));
        assert_eq!(keys, vec!["2025-02-27", "2025-02-28", "2025-03-01", "2025-03-02"]);
        assert!(day_range(date(2025, 3, 2), date(2025, 3, 1)).is_empty());
    }

    #[test]
    fn test_trailing_days() {
        let keys = trailing_days(date(2025, 1, 2), 3);
        assert_eq!(keys, vec!["2024-12-31", "2025-01-01", "2025-01-02"]);
        assert_eq!(trailing_days(date(2025, 1, 2), 30).len(), 30);
        assert!(trailing_days(date(2025, 1, 2), 0).is_empty());
    }

    #[test]
    fn test_previous_month_across_year() {
        assert_eq!(previous_month(date(2025, 1, 15)), (date(2024, 12, 1), date(2024, 12, 31)));
        assert_eq!(previous_month(date(2024, 3, 31)), (date(2024, 2, 1), date(2024, 2, 29)));
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2024), 366);
        assert_eq!(days_in_year(2025), 365);
        assert_eq!(days_in_year(1900), 365);
        assert_eq!(days_in_year(2000), 366);
    }
}
