use std::fmt::Display;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use chrono_english::parse_date_string;
use clap::ValueEnum;

/// Raised when the date an operation should run for can't be determined.
#[derive(Debug, thiserror::Error)]
pub enum ClockResolutionError {
    #[error("Can't interpret \"{expression}\" as a date: {reason}")]
    Unparsable { expression: String, reason: String },
    #[error("Clock is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses human friendly dates like "yesterday", "next monday" or "15/03/2025".
pub fn resolve_date(
    expression: &str,
    now: DateTime<Local>,
    style: DateStyle,
) -> Result<NaiveDate, ClockResolutionError> {
    parse_date_string(expression, now, style.into())
        .map(|v| v.date_naive())
        .map_err(|e| ClockResolutionError::Unparsable {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    let next = date + Duration::days(1);
    // Midnight may not exist on days with a DST jump, then the moment a day later is good enough.
    next.with_time(NaiveTime::MIN).earliest().unwrap_or(next)
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

/// Converts fractional hours entered by the user into a duration, truncated to seconds.
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.) as i64)
}
