use anyhow::{anyhow, Result};
use chrono::{Duration, Local, NaiveDate};
use tracing::{info, warn};

use crate::{
    rollover::week_start_date,
    stopwatch::{commit_lap, DaySegment, Lap, Stopwatch},
    storage::topic_store::{StoreError, TopicStore},
    tracking::{catalog::display_name, entities::WeekdayName},
    utils::time::{format_duration, resolve_date},
};

use super::CliContext;

pub async fn start(context: &CliContext, id: u64) -> Result<()> {
    let topic = context.user_topic(id).await?;
    let stopwatch_file = context.stopwatch_file();
    let mut stopwatch = stopwatch_file.load().await?;
    stopwatch.start(topic.id, Local::now())?;
    stopwatch_file.save(&stopwatch).await?;
    println!("Started the stopwatch for {}", display_name(&topic.topic_id));
    Ok(())
}

/// Stops the stopwatch and commits its time. The stopwatch is only cleared after the time is
/// stored, a failed commit can be retried with another `stop`.
pub async fn stop(context: &CliContext) -> Result<()> {
    let stopwatch_file = context.stopwatch_file();
    let mut stopwatch = stopwatch_file.load().await?;
    let lap = stopwatch.stop(Local::now())?;

    match commit_lap(&context.store, &lap).await {
        Ok(topic) => {
            info!("Committed {lap:?}");
            println!(
                "Recorded {} for {}",
                format_duration(lap.total()),
                display_name(&topic.topic_id)
            );
        }
        Err(StoreError::NotFound(id)) => {
            warn!("Topic {id} of the stopwatch was removed");
            println!("Topic {id} was removed, the time is discarded");
        }
        Err(e) => return Err(e.into()),
    }
    stopwatch_file.save(&stopwatch).await?;
    Ok(())
}

pub async fn status(context: &CliContext) -> Result<()> {
    let stopwatch = context.stopwatch_file().load().await?;
    println!("{}", status_line(&stopwatch, context).await?);
    Ok(())
}

async fn status_line(stopwatch: &Stopwatch, context: &CliContext) -> Result<String> {
    let Some(session) = stopwatch.session() else {
        return Ok("The stopwatch is not running".into());
    };
    let name = match context.store.get(session.topic_id).await? {
        Some(topic) => display_name(&topic.topic_id).to_string(),
        None => format!("removed topic {}", session.topic_id),
    };
    Ok(format!(
        "{} on {} since {}",
        format_duration(stopwatch.elapsed(Local::now())),
        name,
        session.started_at.with_timezone(&Local).format("%x %H:%M:%S")
    ))
}

/// Adds manually entered time into the ledger of the current week.
pub async fn log_time(
    context: &CliContext,
    id: u64,
    minutes: u32,
    date: Option<&str>,
) -> Result<()> {
    let now = Local::now();
    let today = now.date_naive();
    let date = match date {
        Some(date) => resolve_date(date, now, context.date_style)?,
        None => today,
    };
    check_log_date(date, today, context.settings.rollover.week_start)?;
    if minutes == 0 {
        return Err(anyhow!("Nothing to record, minutes have to be above 0"));
    }

    let topic = context.user_topic(id).await?;
    let duration = Duration::minutes(i64::from(minutes));
    let topic = commit_lap(
        &context.store,
        &Lap {
            topic_id: topic.id,
            segments: vec![DaySegment { date, duration }],
        },
    )
    .await?;
    println!(
        "Recorded {} for {} on {}",
        format_duration(duration),
        display_name(&topic.topic_id),
        WeekdayName::of(date)
    );
    Ok(())
}

/// The ledger only holds the current week, so time can only be recorded for its days.
fn check_log_date(date: NaiveDate, today: NaiveDate, week_start: WeekdayName) -> Result<()> {
    let first = week_start_date(today, week_start);
    if date < first || date > today {
        return Err(anyhow!(
            "Time can only be recorded for days from {first} to {today}, got {date}"
        ));
    }
    Ok(())
}
