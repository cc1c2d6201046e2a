use anyhow::{anyhow, Result};
use chrono::Local;
use tracing::info;

use crate::{
    storage::topic_store::TopicStore,
    tracking::{
        catalog::{self, display_name},
        draft::TopicDraft,
        entities::TrackedTopic,
    },
    utils::time::{format_duration, resolve_date},
};

use super::CliContext;

#[derive(Debug, Clone, clap::Args)]
pub struct AddCommand {
    #[arg(help = "Id of the topic from the catalog")]
    topic: String,
    #[arg(long, short, help = "Hours per day you want to spend on the topic")]
    daily: f64,
    #[arg(long, short, help = "Total hours you want to reach")]
    goal: u32,
    #[arg(
        long,
        short,
        default_value = "today",
        help = "Date tracking starts on. Examples are \"today\", \"next monday\", \"15/03/2025\""
    )]
    start: String,
    #[arg(long, short, help = "Date the goal should be reached by")]
    end: String,
}

pub fn print_catalog() {
    for topic in catalog::all() {
        println!("{}\t{}\t{}", topic.id, topic.name, topic.description);
    }
}

pub async fn add_topic(
    context: &CliContext,
    AddCommand {
        topic,
        daily,
        goal,
        start,
        end,
    }: AddCommand,
) -> Result<()> {
    let now = Local::now();
    let draft = TopicDraft {
        user_id: context.user.clone(),
        topic_id: topic,
        daily_effort_target: daily,
        final_goal_hours: goal,
        starting_date: resolve_date(&start, now, context.date_style)?,
        ending_date: resolve_date(&end, now, context.date_style)?,
    };
    let existing = context.user_topics().await?;
    let new_topic = draft.validate(&existing)?;
    let created = context.store.insert(new_topic).await?;
    info!("Created topic {} for {}", created.id, created.user_id);
    println!(
        "Tracking {} as {} from {} to {}",
        display_name(&created.topic_id),
        created.id,
        created.starting_date,
        created.ending_date
    );
    Ok(())
}

pub async fn list_topics(context: &CliContext) -> Result<()> {
    let topics = context.user_topics().await?;
    if topics.is_empty() {
        println!("{} doesn't track any topics yet", context.user);
        return Ok(());
    }
    for topic in topics {
        println!("{}", topic_line(&topic));
    }
    Ok(())
}

fn topic_line(topic: &TrackedTopic) -> String {
    format!(
        "{}\t{}\t{}h/day\t{}/{}h\t{} - {}",
        topic.id,
        display_name(&topic.topic_id),
        topic.daily_effort_target,
        format_duration(topic.recorded_time()),
        topic.final_goal_hours,
        topic.starting_date,
        topic.ending_date
    )
}

pub async fn remove_topic(context: &CliContext, id: u64) -> Result<()> {
    let topic = context.user_topic(id).await?;
    let stopwatch_file = context.stopwatch_file();
    let stopwatch = stopwatch_file.load().await?;
    if stopwatch.session().is_some_and(|v| v.topic_id == id) {
        return Err(anyhow!(
            "The stopwatch is running for topic {id}, stop it first"
        ));
    }
    context.store.delete(topic.id).await?;
    println!("Stopped tracking {}", display_name(&topic.topic_id));
    Ok(())
}

pub async fn clear_topics(context: &CliContext, confirmed: bool) -> Result<()> {
    if !confirmed {
        return Err(anyhow!(
            "This removes every topic tracked by {}. Pass --yes to confirm",
            context.user
        ));
    }
    let removed = context.store.clear_user(&context.user).await?;
    println!("Removed {removed} topics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use crate::tracking::entities::{DailyLedger, TrackedTopic, WeekdayName};

    use super::topic_line;

    #[test]
    fn test_topic_line() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let topic = TrackedTopic {
            id: 3,
            user_id: "user".into(),
            topic_id: "reading".into(),
            daily_effort_target: 1.5,
            final_goal_hours: 40,
            starting_date: start,
            ending_date: start + Duration::days(30),
            total_time_spent: Duration::hours(2),
            weekly_time_spent: Duration::zero(),
            daily_time_spent: DailyLedger::from_iter([(
                WeekdayName::Monday,
                Duration::minutes(30),
            )]),
            last_rollover: None,
        };
        assert_eq!(
            topic_line(&topic),
            "3\tReading\t1.5h/day\t2h30m0s/40h\t2024-04-01 - 2024-05-01"
        );
    }
}
