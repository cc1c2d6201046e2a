pub mod daemon_path;
pub mod process;
pub mod report;
pub mod timer;
pub mod topics;

use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use daemon_path::to_daemon_path;
use process::{kill_previous_servers, restart_server};
use topics::AddCommand;
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    rollover::job::{RolloverJob, RolloverOutcome},
    settings::Settings,
    stopwatch::state_file::StopwatchFile,
    storage::topic_store::{FileTopicStore, TopicStore},
    tracking::entities::TrackedTopic,
    utils::{
        clock::DefaultClock,
        dir::{resolve_application_path, STOPWATCH_FILE, TOPICS_FILE},
        logging::{enable_logging, CLI_PREFIX},
        time::{resolve_date, DateStyle},
    },
};

#[derive(Parser, Debug)]
#[command(name = "TrackThis", version, long_about = None)]
#[command(about = "Track the time you spend on topics you care about", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME/trackthis or $HOME/.local/state/trackthis"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        short,
        global = true,
        help = "User to act for. Defaults to the user in settings.json, then to $USER"
    )]
    user: Option<String>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "List topics that can be tracked")]
    Catalog {},
    #[command(about = "Start tracking a topic")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "List tracked topics")]
    List {},
    #[command(about = "Stop tracking a topic and forget its time")]
    Remove { id: u64 },
    #[command(about = "Remove every tracked topic of the user")]
    Clear {
        #[arg(long, help = "Confirm removal")]
        yes: bool,
    },
    #[command(about = "Record time spent on a topic without the stopwatch")]
    Log {
        id: u64,
        #[arg(long, short)]
        minutes: u32,
        #[arg(
            long,
            short,
            help = "Day the time was spent on. Examples are \"today\", \"yesterday\", \"15/03/2025\". Has to be in the current week"
        )]
        date: Option<String>,
    },
    #[command(about = "Start the stopwatch for a topic")]
    Start { id: u64 },
    #[command(about = "Stop the stopwatch and record the elapsed time")]
    Stop {},
    #[command(about = "Show the running stopwatch")]
    Status {},
    #[command(about = "Show progress of the current week")]
    Report {},
    #[command(
        about = "Run the weekly rollover now. Only changes topics on the week-start day and only once per day"
    )]
    Rollover {
        #[arg(long, short, help = "Date to run the rollover for. Defaults to today")]
        date: Option<String>,
    },
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    StopDaemon {},
}

/// State shared by the commands.
pub struct CliContext {
    pub dir: PathBuf,
    pub user: String,
    pub settings: Settings,
    pub date_style: DateStyle,
    pub store: FileTopicStore,
}

impl CliContext {
    pub fn new(dir: PathBuf, user: String, settings: Settings, date_style: DateStyle) -> Result<Self> {
        let store = FileTopicStore::new(dir.join(TOPICS_FILE))?;
        Ok(Self {
            dir,
            user,
            settings,
            date_style,
            store,
        })
    }

    pub fn stopwatch_file(&self) -> StopwatchFile {
        StopwatchFile::new(self.dir.join(STOPWATCH_FILE))
    }

    pub async fn user_topics(&self) -> Result<Vec<TrackedTopic>> {
        Ok(self
            .store
            .fetch_all()
            .await?
            .into_iter()
            .filter(|v| v.user_id == self.user)
            .collect())
    }

    /// Finds a topic of the current user. Topics of other users are reported as missing.
    pub async fn user_topic(&self, id: u64) -> Result<TrackedTopic> {
        self.store
            .get(id)
            .await?
            .filter(|v| v.user_id == self.user)
            .ok_or_else(|| anyhow!("Topic {id} is not tracked by {}", self.user))
    }
}

fn resolve_user(user: Option<String>, settings: &Settings) -> String {
    user.or_else(|| settings.user.clone())
        .or_else(|| env::var("USER").ok())
        .or_else(|| env::var("USERNAME").ok())
        .unwrap_or_else(|| "local".into())
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    let settings = Settings::load(&dir).await?;
    let user = resolve_user(args.user, &settings);
    let context = CliContext::new(dir, user, settings, args.date_style)?;

    match args.commands {
        Commands::Catalog {} => {
            topics::print_catalog();
            Ok(())
        }
        Commands::Add { command } => topics::add_topic(&context, command).await,
        Commands::List {} => topics::list_topics(&context).await,
        Commands::Remove { id } => topics::remove_topic(&context, id).await,
        Commands::Clear { yes } => topics::clear_topics(&context, yes).await,
        Commands::Log { id, minutes, date } => {
            timer::log_time(&context, id, minutes, date.as_deref()).await
        }
        Commands::Start { id } => timer::start(&context, id).await,
        Commands::Stop {} => timer::stop(&context).await,
        Commands::Status {} => timer::status(&context).await,
        Commands::Report {} => report::print_report(&context).await,
        Commands::Rollover { date } => run_rollover(&context, date.as_deref()).await,
        Commands::Init {} => restart_server(&context.dir),
        Commands::Serve {} => start_daemon(context.dir).await,
        Commands::StopDaemon {} => {
            let process_name = to_daemon_path(env::current_exe()?);
            kill_previous_servers(&process_name)
        }
    }
}

async fn run_rollover(context: &CliContext, date: Option<&str>) -> Result<()> {
    let today = match date {
        Some(date) => resolve_date(date, chrono::Local::now(), context.date_style)?,
        None => chrono::Local::now().date_naive(),
    };
    let store = std::sync::Arc::new(FileTopicStore::new(context.dir.join(TOPICS_FILE))?);
    let job = RolloverJob::new(store, context.settings.rollover.clone(), Box::new(DefaultClock));
    match job.run(today).await? {
        RolloverOutcome::Skipped { weekday } => {
            println!(
                "{today} is a {weekday}, the week starts on {}. Nothing to do",
                job.config().week_start
            );
        }
        RolloverOutcome::Applied(report) => {
            println!(
                "Rolled over {} topics, {} were already rolled over today",
                report.updated.len(),
                report.already_applied.len()
            );
            if !report.failed.is_empty() {
                return Err(anyhow!(
                    "Failed to roll over topics {:?}, run the command again to retry",
                    report.failed
                ));
            }
        }
    }
    Ok(())
}
