use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    storage::topic_store::{StoreError, TopicChange, TopicStore},
    tracking::entities::WeekdayName,
    utils::{clock::Clock, time::ClockResolutionError},
};

use super::{
    config::{RolloverConfig, RolloverPolicy},
    rollover_topic,
};

#[derive(Debug, thiserror::Error)]
pub enum RolloverError {
    #[error("Can't resolve the current date: {0}")]
    ClockResolution(#[from] ClockResolutionError),
    #[error("Can't read topics: {0}")]
    Store(#[from] StoreError),
}

/// Result of a single rollover invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// The day is not the week-start day, nothing was touched.
    Skipped { weekday: WeekdayName },
    Applied(RolloverReport),
}

/// Ids of topics split by what happened to them during an applied rollover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverReport {
    pub updated: Vec<u64>,
    /// Topics that were already rolled over on the same date by an earlier run.
    pub already_applied: Vec<u64>,
    /// Topics whose update kept failing. They stay as they were and are picked up by the next
    /// run on the same day.
    pub failed: Vec<u64>,
}

/// Applies the weekly rollover to every topic of a [TopicStore].
///
/// Every rolled over topic is stamped with the date of the rollover, so running the job again on
/// the same day only touches topics that failed previously. Records are updated one by one, a
/// failing record doesn't stop the rest.
pub struct RolloverJob {
    store: Arc<dyn TopicStore>,
    config: RolloverConfig,
    clock: Box<dyn Clock>,
}

impl RolloverJob {
    pub fn new(store: Arc<dyn TopicStore>, config: RolloverConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RolloverConfig {
        &self.config
    }

    /// Runs the rollover for the date provided by the clock.
    pub async fn run_today(&self) -> Result<RolloverOutcome, RolloverError> {
        let today = self.clock.today()?;
        self.run(today).await
    }

    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<RolloverOutcome, RolloverError> {
        let weekday = WeekdayName::of(today);
        if weekday != self.config.week_start {
            debug!("{weekday} is not {}, skipping rollover", self.config.week_start);
            return Ok(RolloverOutcome::Skipped { weekday });
        }

        let topics = self.store.fetch_all().await?;
        let mut report = RolloverReport::default();

        for topic in topics {
            let id = topic.id;
            if topic.last_rollover == Some(today) {
                report.already_applied.push(id);
                continue;
            }

            match self.roll_with_retry(id, today).await {
                Ok(true) => report.updated.push(id),
                // Another run finished the topic after it was fetched.
                Ok(false) => report.already_applied.push(id),
                Err(StoreError::NotFound(_)) => debug!("Topic {id} was removed during rollover"),
                Err(e) => {
                    error!("Rollover of topic {id} failed {e:?}");
                    report.failed.push(id);
                }
            }
        }

        info!(
            "Rollover for {today} finished: {} updated, {} already applied, {} failed",
            report.updated.len(),
            report.already_applied.len(),
            report.failed.len()
        );
        Ok(RolloverOutcome::Applied(report))
    }

    /// Rolls a single topic over under the store lock, so a write of the cli can't be lost in
    /// between. Returns `false` if the topic had already been rolled over on `today`.
    async fn roll_with_retry(&self, id: u64, today: NaiveDate) -> Result<bool, StoreError> {
        let attempts = self.config.update_attempts.max(1);
        let mut attempt = 1;
        loop {
            let change = rollover_change(today, self.config.policy);
            match self.store.update_with(id, change).await {
                Ok(changed) => return Ok(changed.is_some()),
                Err(e @ StoreError::NotFound(_)) => return Err(e),
                Err(e) if attempt < attempts => {
                    warn!("Attempt {attempt}/{attempts} to update topic {id} failed {e}");
                    self.clock.sleep(self.config.retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn rollover_change(today: NaiveDate, policy: RolloverPolicy) -> TopicChange {
    Box::new(move |topic| {
        if topic.last_rollover == Some(today) {
            return false;
        }
        *topic = rollover_topic(topic.clone(), policy);
        topic.last_rollover = Some(today);
        true
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        rollover::config::RolloverConfig,
        stopwatch::{commit_lap, DaySegment, Lap},
        storage::topic_store::{FileTopicStore, MockTopicStore, StoreError, TopicStore},
        tracking::entities::{NewTopic, TrackedTopic, WeekdayName},
        utils::{clock::Clock, logging::TEST_LOGGING, test_clock::TestClock},
    };

    use super::{RolloverError, RolloverJob, RolloverOutcome, RolloverReport};

    /// 2024-04-01 is a Monday.
    const TEST_MONDAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(TEST_MONDAY, NaiveTime::MIN);

    fn clock() -> TestClock {
        TestClock::at(Utc.from_utc_datetime(&TEST_START_DATE))
    }

    fn config() -> RolloverConfig {
        RolloverConfig {
            update_attempts: 2,
            retry_delay_secs: 1,
            ..RolloverConfig::default()
        }
    }

    fn new_topic(topic_id: &str) -> NewTopic {
        NewTopic {
            user_id: "user".into(),
            topic_id: topic_id.into(),
            daily_effort_target: 1.,
            final_goal_hours: 50,
            starting_date: TEST_MONDAY - Duration::days(30),
            ending_date: TEST_MONDAY + Duration::days(30),
        }
    }

    fn tracked(id: u64, hours_last_week: i64) -> TrackedTopic {
        let mut topic = TrackedTopic::new(id, new_topic("reading"));
        topic.total_time_spent = Duration::hours(10);
        topic.record(TEST_MONDAY - Duration::days(1), Duration::hours(hours_last_week));
        topic
    }

    fn store_failure() -> StoreError {
        StoreError::Io(std::io::Error::other("disk is gone"))
    }

    #[tokio::test]
    async fn test_skips_other_days_without_touching_store() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockTopicStore::new();
        store.expect_fetch_all().never();
        store.expect_update_with().never();

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        let outcome = job.run(TEST_MONDAY + Duration::days(3)).await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Skipped {
                weekday: WeekdayName::Thursday
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_applies_once_per_day() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = Arc::new(FileTopicStore::new(dir.path().join("topics"))?);
        let mut reading = store.insert(new_topic("reading")).await?;
        reading.record(TEST_MONDAY - Duration::days(1), Duration::hours(2));
        reading.record(TEST_MONDAY - Duration::days(2), Duration::hours(1));
        reading.total_time_spent = Duration::hours(4);
        store.update(&reading).await?;
        let music = store.insert(new_topic("music")).await?;

        let job = RolloverJob::new(store.clone(), config(), Box::new(clock()));

        let outcome = job.run_today().await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Applied(RolloverReport {
                updated: vec![reading.id, music.id],
                ..Default::default()
            })
        );

        let rolled = store.get(reading.id).await?.expect("topic should exist");
        assert_eq!(rolled.total_time_spent, Duration::hours(3));
        assert_eq!(rolled.weekly_time_spent, Duration::hours(4));
        assert!(rolled.daily_time_spent.is_empty());
        assert_eq!(rolled.last_rollover, Some(TEST_MONDAY));

        // A second trigger on the same day must not fold the week again.
        let outcome = job.run(TEST_MONDAY).await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Applied(RolloverReport {
                already_applied: vec![reading.id, music.id],
                ..Default::default()
            })
        );
        assert_eq!(store.get(reading.id).await?, Some(rolled));
        Ok(())
    }

    #[tokio::test]
    async fn test_time_recorded_after_rollover_keeps_it() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = Arc::new(FileTopicStore::new(dir.path().join("topics"))?);
        let mut topic = store.insert(new_topic("reading")).await?;
        topic.record(TEST_MONDAY - Duration::days(1), Duration::hours(3));
        topic.total_time_spent = Duration::hours(10);
        store.update(&topic).await?;

        // The cli reads the topic, the daemon rolls the week over, then the cli writes.
        let seen_by_cli = store.get(topic.id).await?.expect("topic should exist");
        let job = RolloverJob::new(store.clone(), config(), Box::new(clock()));
        job.run(TEST_MONDAY).await?;
        commit_lap(
            store.as_ref(),
            &Lap {
                topic_id: seen_by_cli.id,
                segments: vec![DaySegment {
                    date: TEST_MONDAY,
                    duration: Duration::minutes(20),
                }],
            },
        )
        .await?;

        let stored = store.get(topic.id).await?.expect("topic should exist");
        assert_eq!(stored.last_rollover, Some(TEST_MONDAY));
        assert_eq!(stored.total_time_spent, Duration::hours(3));
        assert_eq!(stored.weekly_time_spent, Duration::hours(10));
        assert!(stored.daily_time_spent.get(WeekdayName::Sunday).is_zero());
        assert_eq!(
            stored.daily_time_spent.get(WeekdayName::Monday),
            Duration::minutes(20)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_topic_rolled_by_concurrent_run_is_not_folded_again() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockTopicStore::new();
        // Fetched before the other run stamped it.
        store
            .expect_fetch_all()
            .returning(|| Ok(vec![tracked(1, 3)]));
        store.expect_update_with().times(1).returning(|_, change| {
            let mut stored = tracked(1, 0);
            stored.last_rollover = Some(TEST_MONDAY);
            Ok(change(&mut stored).then_some(stored))
        });

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        assert_eq!(
            job.run(TEST_MONDAY).await?,
            RolloverOutcome::Applied(RolloverReport {
                already_applied: vec![1],
                ..Default::default()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_failure_is_completed_by_next_run() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockTopicStore::new();
        store
            .expect_fetch_all()
            .times(1)
            .returning(|| Ok(vec![tracked(1, 3), tracked(2, 4)]));
        store
            .expect_update_with()
            .withf(|id, _| *id == 1)
            .times(2)
            .returning(|_, _| Err(store_failure()));
        store
            .expect_update_with()
            .withf(|id, _| *id == 2)
            .times(1)
            .returning(|_, change| {
                let mut stored = tracked(2, 4);
                assert!(change(&mut stored));
                assert!(stored.daily_time_spent.is_empty());
                Ok(Some(stored))
            });

        let test_clock = clock();
        let job = RolloverJob::new(Arc::new(store), config(), Box::new(test_clock.clone()));
        let outcome = job.run(TEST_MONDAY).await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Applied(RolloverReport {
                updated: vec![2],
                already_applied: vec![],
                failed: vec![1],
            })
        );
        // One retry delay between the two attempts of topic 1.
        assert_eq!(
            test_clock.time(),
            Utc.from_utc_datetime(&TEST_START_DATE) + Duration::seconds(1)
        );

        let mut store = MockTopicStore::new();
        store.expect_fetch_all().times(1).returning(|| {
            let mut done = tracked(2, 0);
            done.daily_time_spent.clear();
            done.last_rollover = Some(TEST_MONDAY);
            Ok(vec![tracked(1, 3), done])
        });
        store
            .expect_update_with()
            .withf(|id, _| *id == 1)
            .times(1)
            .returning(|_, change| {
                let mut stored = tracked(1, 3);
                assert!(change(&mut stored));
                assert_eq!(stored.total_time_spent, Duration::hours(3));
                assert_eq!(stored.weekly_time_spent, Duration::hours(10));
                assert_eq!(stored.last_rollover, Some(TEST_MONDAY));
                Ok(Some(stored))
            });

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        let outcome = job.run(TEST_MONDAY).await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Applied(RolloverReport {
                updated: vec![1],
                already_applied: vec![2],
                failed: vec![],
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockTopicStore::new();
        store
            .expect_fetch_all()
            .returning(|| Ok(vec![tracked(1, 3)]));
        let mut calls = 0;
        store.expect_update_with().times(2).returning(move |_, change| {
            calls += 1;
            if calls == 1 {
                Err(store_failure())
            } else {
                let mut stored = tracked(1, 3);
                Ok(change(&mut stored).then_some(stored))
            }
        });

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        let outcome = job.run(TEST_MONDAY).await?;
        assert_eq!(
            outcome,
            RolloverOutcome::Applied(RolloverReport {
                updated: vec![1],
                ..Default::default()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_topic_is_not_a_failure() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockTopicStore::new();
        store
            .expect_fetch_all()
            .returning(|| Ok(vec![tracked(1, 3)]));
        store
            .expect_update_with()
            .times(1)
            .returning(|id, _| Err(StoreError::NotFound(id)));

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        assert_eq!(
            job.run(TEST_MONDAY).await?,
            RolloverOutcome::Applied(RolloverReport::default())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_store() -> Result<()> {
        let mut store = MockTopicStore::new();
        store.expect_fetch_all().returning(|| Ok(vec![]));
        store.expect_update_with().never();

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        assert_eq!(
            job.run(TEST_MONDAY).await?,
            RolloverOutcome::Applied(RolloverReport::default())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unresolvable_clock_fails_invocation() {
        let mut store = MockTopicStore::new();
        store.expect_fetch_all().never();

        let job = RolloverJob::new(
            Arc::new(store),
            config(),
            Box::new(TestClock::unresolvable(Utc.from_utc_datetime(
                &TEST_START_DATE,
            ))),
        );
        assert!(matches!(
            job.run_today().await,
            Err(RolloverError::ClockResolution(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_invocation() {
        let mut store = MockTopicStore::new();
        store
            .expect_fetch_all()
            .returning(|| Err(store_failure()));
        store.expect_update_with().never();

        let job = RolloverJob::new(Arc::new(store), config(), Box::new(clock()));
        assert!(matches!(
            job.run(TEST_MONDAY).await,
            Err(RolloverError::Store(_))
        ));
    }
}
