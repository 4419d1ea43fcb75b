use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reset policy attached to a task definition by the catalog admin.
///
/// Unknown period strings deserialize to `Other` and behave like a
/// one-time task.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    Daily,
    Weekly,
    Once,
    Infinite,
    #[serde(other)]
    Other,
}

fn date_of(timestamp_ms: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .date_naive()
}

/// True when both timestamps fall on the same calendar day (UTC).
pub fn is_same_day(timestamp_ms: i64, now_ms: i64) -> bool {
    date_of(timestamp_ms) == date_of(now_ms)
}

/// True when `timestamp_ms` falls on or after the most recent Monday
/// 00:00 relative to `now_ms`. Weeks start on Monday.
pub fn is_same_week(timestamp_ms: i64, now_ms: i64) -> bool {
    date_of(timestamp_ms) >= start_of_week(now_ms)
}

fn start_of_week(now_ms: i64) -> NaiveDate {
    let today = date_of(now_ms);
    let days_from_monday = today.weekday().num_days_from_monday();
    today
        .checked_sub_days(Days::new(u64::from(days_from_monday)))
        .unwrap_or(today)
}
