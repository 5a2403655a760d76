// src/main.rs

use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;
use study_scheduler::models::{AllocationOptions, CalendarWindow, DailyConstraints};
use study_scheduler::{EngineConfig, PlanRequest, SqliteStore, StudyPlanner};

/// Study planner backed by a local SQLite database
#[derive(Parser)]
#[command(name = "study-scheduler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Database file
    #[arg(long, default_value = "study_scheduler.db")]
    db: PathBuf,

    /// TOML file overriding engine parameters
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load subjects and topics from a JSON catalog
    Seed { file: PathBuf },

    /// Log a raw study session (question counts feed the success rate)
    Session {
        #[arg(long)]
        learner: i64,
        #[arg(long)]
        topic: i64,
        #[arg(long, default_value = "0")]
        correct: u32,
        #[arg(long, default_value = "0")]
        wrong: u32,
        #[arg(long, default_value = "0")]
        empty: u32,
        #[arg(long, default_value = "0")]
        minutes: u32,
    },

    /// Apply a study event to the topic's repetition record
    Record {
        #[arg(long)]
        learner: i64,
        #[arg(long)]
        topic: i64,
        /// Performance in [0, 1]
        #[arg(long)]
        score: f64,
    },

    /// List reviews that are due now
    Due {
        #[arg(long)]
        learner: i64,
    },

    /// Rank the topics of an exam track
    Rank {
        #[arg(long)]
        learner: i64,
        #[arg(long)]
        track: String,
    },

    /// Generate a plan and make it the active one
    Plan {
        #[arg(long)]
        learner: i64,
        #[arg(long)]
        track: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "4")]
        hours: f64,
        #[arg(long, default_value = "09:00")]
        from: String,
        #[arg(long, default_value = "21:00")]
        until: String,
        #[arg(long, default_value = "15")]
        break_minutes: u32,
        #[arg(long)]
        no_review: bool,
        #[arg(long)]
        focus_weak: bool,
        /// Restrict to these subject ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        subjects: Vec<i64>,
    },

    /// Print the active plan
    Show {
        #[arg(long)]
        learner: i64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_toml_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    let planner = StudyPlanner::new(config)?;
    let mut store = SqliteStore::open(&cli.db)?;
    let now = Utc::now();

    match cli.command {
        Commands::Seed { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("reading catalog {}", file.display()))?;
            let count = store.seed_catalog(&raw)?;
            info!("Seeded {} topics from {}", count, file.display());
        }
        Commands::Session {
            learner,
            topic,
            correct,
            wrong,
            empty,
            minutes,
        } => {
            store.log_study_session(learner, topic, correct, wrong, empty, minutes, now)?;
        }
        Commands::Record {
            learner,
            topic,
            score,
        } => {
            let record = store.record_study_event(planner.tracker(), learner, topic, score, now)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Due { learner } => {
            let due = planner.due_topics(&store, learner, now)?;
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        Commands::Rank { learner, track } => {
            let ranked = planner.rank_topics(&store, learner, &track, now)?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        Commands::Plan {
            learner,
            track,
            start,
            end,
            hours,
            from,
            until,
            break_minutes,
            no_review,
            focus_weak,
            subjects,
        } => {
            let request = PlanRequest {
                learner_id: learner,
                exam_track: track,
                window: CalendarWindow {
                    start_date: start,
                    end_date: end,
                },
                constraints: DailyConstraints {
                    daily_study_hours: hours,
                    preferred_start_time: parse_clock(&from)?,
                    preferred_end_time: parse_clock(&until)?,
                    break_duration_minutes: break_minutes,
                    include_review_sessions: !no_review,
                },
                options: AllocationOptions {
                    focus_on_weak_topics: focus_weak,
                    priority_subjects: subjects,
                },
            };
            let (plan_id, plan) = planner.generate_and_activate(&mut store, &request, now)?;
            info!("Plan {} stored as active", plan_id);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Show { learner } => match planner.active_plan(&store, learner)? {
            Some(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
            None => bail!("learner {} has no active plan", learner),
        },
    }

    Ok(())
}

fn parse_clock(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").with_context(|| format!("invalid time {raw:?}, expected HH:MM"))
}
