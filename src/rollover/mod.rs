//! Weekly rollover of tracked time. On the week-start day the time of the finished week is
//! archived according to [RolloverPolicy] and the per-day ledger is cleared for the new week.
//!
//! [rollover_if_week_start] is the pure part of it, [job::RolloverJob] applies it to a
//! [TopicStore](crate::storage::topic_store::TopicStore).

pub mod config;
pub mod job;

use chrono::{Duration, NaiveDate};
use config::{RolloverConfig, RolloverPolicy};

use crate::tracking::entities::{TrackedTopic, WeekdayName};

/// Date of the most recent `week_start` day on or before `today`. The ledger holds time spent
/// from that date on.
pub fn week_start_date(today: NaiveDate, week_start: WeekdayName) -> NaiveDate {
    let mut date = today;
    while WeekdayName::of(date) != week_start {
        date -= Duration::days(1);
    }
    date
}

/// Weekdays in the order they happen in a week starting on `week_start`.
pub fn ordered_week(week_start: WeekdayName) -> impl Iterator<Item = WeekdayName> {
    WeekdayName::ALL
        .into_iter()
        .cycle()
        .skip_while(move |day| *day != week_start)
        .take(7)
}

/// Archives the week of a single topic and clears its ledger. Only the passed topic is read.
pub fn rollover_topic(mut topic: TrackedTopic, policy: RolloverPolicy) -> TrackedTopic {
    match policy {
        RolloverPolicy::FoldForward => {
            let previous_total = topic.total_time_spent;
            topic.total_time_spent = topic.daily_time_spent.sum() + topic.weekly_time_spent;
            topic.weekly_time_spent = previous_total;
        }
        RolloverPolicy::Snapshot => {
            topic.weekly_time_spent = topic.total_time_spent;
        }
    }
    topic.daily_time_spent.clear();
    topic
}

/// Rolls every topic over if `today` is the configured week-start day, otherwise returns the
/// topics untouched.
pub fn rollover_if_week_start(
    topics: Vec<TrackedTopic>,
    today: WeekdayName,
    config: &RolloverConfig,
) -> Vec<TrackedTopic> {
    if today != config.week_start {
        return topics;
    }
    topics
        .into_iter()
        .map(|topic| rollover_topic(topic, config.policy))
        .collect()
}
