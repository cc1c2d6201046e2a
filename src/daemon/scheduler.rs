use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::TimeZone;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    rollover::job::{RolloverJob, RolloverOutcome},
    stopwatch::{commit_lap, state_file::StopwatchFile, Lap, Stopwatch},
    storage::topic_store::{StoreError, TopicStore},
    utils::{
        clock::Clock,
        time::{format_duration, next_day_start},
    },
};

/// Extra wait after midnight so the clock is surely on the new day when the daily run starts.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// What a single daily run did.
#[derive(Debug, Default)]
pub struct DailyRun {
    pub reset: Option<Lap>,
    pub rollover: Option<RolloverOutcome>,
}

/// Periodic trigger of the daemon. Runs once right after start and then after every midnight of
/// `timezone`. A run first resets the stopwatch, committing the time of previous days, and only
/// then rolls the week over, so that the time spent before midnight is part of the old week.
pub struct DailyScheduler<Tz: TimeZone> {
    store: Arc<dyn TopicStore>,
    stopwatch: StopwatchFile,
    job: RolloverJob,
    clock: Box<dyn Clock>,
    timezone: Tz,
    shutdown: CancellationToken,
}

impl<Tz: TimeZone> DailyScheduler<Tz> {
    pub fn new(
        store: Arc<dyn TopicStore>,
        stopwatch: StopwatchFile,
        job: RolloverJob,
        clock: Box<dyn Clock>,
        timezone: Tz,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            stopwatch,
            job,
            clock,
            timezone,
            shutdown,
        }
    }

    /// Executes the scheduler loop until shutdown.
    pub async fn run(self) -> Result<()> {
        loop {
            self.tick().await;

            let now = self.clock.time().with_timezone(&self.timezone);
            let wait = (next_day_start(now.clone()) - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                + SETTLE_DELAY;
            debug!("Next daily run in {wait:?}");

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep(wait) => ()
            }
        }
    }

    /// Performs the daily reset and the weekly rollover. Failures are logged, the next day gets
    /// another chance.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> DailyRun {
        let mut run = DailyRun::default();

        match self.reset_stopwatch().await {
            Ok(lap) => run.reset = lap,
            Err(e) => error!("Daily stopwatch reset failed {e:?}"),
        }

        match self.job.run_today().await {
            Ok(outcome) => {
                info!("Rollover finished {outcome:?}");
                run.rollover = Some(outcome);
            }
            Err(e) => error!("Rollover failed {e:?}"),
        }
        run
    }

    async fn reset_stopwatch(&self) -> Result<Option<Lap>> {
        let mut stopwatch = self.stopwatch.load().await?;
        let now = self.clock.time().with_timezone(&self.timezone);
        let Some(lap) = stopwatch.daily_reset(now) else {
            return Ok(None);
        };

        match commit_lap(self.store.as_ref(), &lap).await {
            Ok(_) => {
                info!(
                    "Moved {} of a running session into topic {}",
                    format_duration(lap.total()),
                    lap.topic_id
                );
                self.stopwatch.save(&stopwatch).await?;
                Ok(Some(lap))
            }
            Err(StoreError::NotFound(id)) => {
                warn!("Topic {id} of the running stopwatch doesn't exist anymore, dropping it");
                self.stopwatch.save(&Stopwatch::default()).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
