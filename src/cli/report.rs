use anyhow::Result;
use ansi_term::Colour;
use chrono::{Duration, Local, NaiveDate};

use crate::{
    rollover::{ordered_week, week_start_date},
    tracking::{
        catalog::display_name,
        entities::{TrackedTopic, WeekdayName},
    },
    utils::{
        percentage::duration_percentage,
        time::{format_duration, hours_to_duration},
    },
};

use super::CliContext;

const BAR_WIDTH: usize = 20;

pub async fn print_report(context: &CliContext) -> Result<()> {
    let today = Local::now().date_naive();
    let week_start = context.settings.rollover.week_start;
    let topics = context.user_topics().await?;

    println!(
        "Week of {} for {}",
        week_start_date(today, week_start),
        context.user
    );
    if topics.is_empty() {
        println!("Nothing is tracked yet, see the catalog command");
    }
    for topic in topics {
        println!();
        for line in render_topic(&topic, today, week_start) {
            println!("{line}");
        }
    }
    Ok(())
}

fn render_topic(topic: &TrackedTopic, today: NaiveDate, week_start: WeekdayName) -> Vec<String> {
    let target = hours_to_duration(topic.daily_effort_target);
    let mut lines = vec![format!(
        "{} ({}) {}h per day",
        display_name(&topic.topic_id),
        topic.id,
        topic.daily_effort_target
    )];

    for day in ordered_week(week_start) {
        let spent = topic.daily_time_spent.get(day);
        let bar = progress_bar(spent, target);
        let bar = if !spent.is_zero() && spent >= target {
            Colour::Green.paint(bar).to_string()
        } else {
            bar
        };
        lines.push(format!("  {}\t{bar}\t{}", day.short(), format_duration(spent)));
    }

    let today_spent = topic.daily_time_spent.get(WeekdayName::of(today));
    lines.push(format!(
        "  Today {} of {}, {}",
        format_duration(today_spent),
        format_duration(target),
        if today_spent >= target {
            "target met"
        } else {
            "target not met yet"
        }
    ));

    let recorded = topic.recorded_time();
    lines.push(format!(
        "  This week {}, previous week {}",
        format_duration(topic.daily_time_spent.sum()),
        format_duration(topic.weekly_time_spent)
    ));
    lines.push(format!(
        "  Recorded {} of {}h ({}), {}",
        format_duration(recorded),
        topic.final_goal_hours,
        duration_percentage(recorded, topic.final_goal()),
        days_left(topic.ending_date, today)
    ));
    lines
}

fn progress_bar(spent: Duration, target: Duration) -> String {
    let share = *duration_percentage(spent, target).capped() / 100.;
    let filled = (share * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

fn days_left(ending_date: NaiveDate, today: NaiveDate) -> String {
    match (ending_date - today).num_days() {
        days if days < 0 => format!("ended {} days ago", -days),
        0 => "ends today".to_string(),
        1 => "1 day left".to_string(),
        days => format!("{days} days left"),
    }
}
