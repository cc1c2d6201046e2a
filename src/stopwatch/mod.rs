//! Live timing of a session spent on a topic. Elapsed time ends up in the ledger of the topic,
//! split by the local day it was spent on.
//!
//! The stopwatch is reset every day by the daemon, see [Stopwatch::daily_reset], so a session
//! running over midnight doesn't silently put yesterday's time into today.

pub mod state_file;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use now::DateTimeNow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    storage::topic_store::{StoreError, TopicStore},
    tracking::entities::TrackedTopic,
    utils::time::next_day_start,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StopwatchError {
    #[error("Stopwatch is already running for topic {0}")]
    AlreadyRunning(u64),
    #[error("Stopwatch is not running")]
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub topic_id: u64,
    pub started_at: DateTime<Utc>,
}

/// Time spent during a single local day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySegment {
    pub date: NaiveDate,
    pub duration: Duration,
}

/// Elapsed time cut off from a session, ready to be committed into the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lap {
    pub topic_id: u64,
    pub segments: Vec<DaySegment>,
}

impl Lap {
    pub fn total(&self) -> Duration {
        self.segments
            .iter()
            .fold(Duration::zero(), |ac, next| ac + next.duration)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stopwatch {
    session: Option<Session>,
}

impl Stopwatch {
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn start<Tz: TimeZone>(
        &mut self,
        topic_id: u64,
        now: DateTime<Tz>,
    ) -> Result<(), StopwatchError> {
        if let Some(session) = &self.session {
            return Err(StopwatchError::AlreadyRunning(session.topic_id));
        }
        self.session = Some(Session {
            topic_id,
            started_at: now.with_timezone(&Utc),
        });
        Ok(())
    }

    pub fn elapsed<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Duration {
        self.session
            .as_ref()
            .map(|v| (now.with_timezone(&Utc) - v.started_at).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }

    /// Stops the session. Elapsed time is split on the day boundaries of `now`'s timezone.
    pub fn stop<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<Lap, StopwatchError> {
        let session = self.session.take().ok_or(StopwatchError::NotRunning)?;
        let start = session.started_at.with_timezone(&now.timezone());
        Ok(Lap {
            topic_id: session.topic_id,
            segments: split_by_day(start, now),
        })
    }

    /// Cuts off the time a running session spent on previous days and restarts it at the
    /// beginning of the current day. Does nothing when no session runs or it started today.
    pub fn daily_reset<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Option<Lap> {
        let session = self.session.as_mut()?;
        let start = session.started_at.with_timezone(&now.timezone());
        if start.date_naive() >= now.date_naive() {
            return None;
        }

        let day_start = now.beginning_of_day();
        debug!(
            "Resetting stopwatch of topic {} started at {:?}",
            session.topic_id, session.started_at
        );
        let segments = split_by_day(start, day_start.clone());
        session.started_at = day_start.with_timezone(&Utc);
        Some(Lap {
            topic_id: session.topic_id,
            segments,
        })
    }
}

/// Splits the interval from `start` to `end` into pieces that don't cross midnight.
pub fn split_by_day<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>) -> Vec<DaySegment> {
    let mut segments = vec![];
    let mut cursor = start;
    while cursor < end {
        let boundary = next_day_start(cursor.clone()).min(end.clone());
        segments.push(DaySegment {
            date: cursor.date_naive(),
            duration: boundary.clone() - cursor.clone(),
        });
        cursor = boundary;
    }
    segments
}

/// Adds the time of a lap into the ledger of its topic. The topic is changed under the store
/// lock, a rollover running at the same time is never overwritten.
pub async fn commit_lap(store: &dyn TopicStore, lap: &Lap) -> Result<TrackedTopic, StoreError> {
    let segments = lap.segments.clone();
    store
        .update_with(
            lap.topic_id,
            Box::new(move |topic| {
                for segment in segments {
                    topic.record(segment.date, segment.duration);
                }
                true
            }),
        )
        .await?
        .ok_or(StoreError::NotFound(lap.topic_id))
}
