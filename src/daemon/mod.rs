use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::{Local, TimeZone};
use scheduler::DailyScheduler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    rollover::{config::RolloverConfig, job::RolloverJob},
    settings::Settings,
    stopwatch::state_file::StopwatchFile,
    storage::topic_store::{FileTopicStore, TopicStore},
    utils::{
        clock::{Clock, DefaultClock},
        dir::{STOPWATCH_FILE, TOPICS_FILE},
    },
};

pub mod args;
pub mod scheduler;
pub mod shutdown;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let dir = dir.canonicalize()?;
    let settings = Settings::load(&dir).await?;
    std::env::set_current_dir("/")?;

    info!(
        "Starting daemon in {dir:?}, week starts on {}",
        settings.rollover.week_start
    );

    let shutdown_token = CancellationToken::new();

    let scheduler = create_scheduler(
        &dir,
        settings.rollover,
        &shutdown_token,
        DefaultClock,
        Local,
    )?;

    let (_, scheduler_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        scheduler.run(),
    );

    if let Err(scheduler_result) = scheduler_result {
        error!("Scheduler got an error {:?}", scheduler_result);
    }

    Ok(())
}

fn create_scheduler<Tz: TimeZone>(
    dir: &Path,
    config: RolloverConfig,
    shutdown_token: &CancellationToken,
    clock: impl Clock + Clone,
    timezone: Tz,
) -> Result<DailyScheduler<Tz>> {
    let store: Arc<dyn TopicStore> = Arc::new(FileTopicStore::new(dir.join(TOPICS_FILE))?);
    let job = RolloverJob::new(store.clone(), config, Box::new(clock.clone()));
    Ok(DailyScheduler::new(
        store,
        StopwatchFile::new(dir.join(STOPWATCH_FILE)),
        job,
        Box::new(clock),
        timezone,
        shutdown_token.clone(),
    ))
}
