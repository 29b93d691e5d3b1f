use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use learn_core::dashboard::LeaderboardSort;

#[derive(Debug, Parser)]
#[command(name = "learn", version, about = "Walk through a course from the terminal")]
pub struct Cli {
    /// SQLite database for local mode.
    #[arg(long, env = "LEARN_DB_URL", default_value = "sqlite://dev.sqlite3", global = true)]
    pub db: String,

    #[arg(long, env = "LEARN_LEARNER_ID", default_value_t = 1, global = true)]
    pub learner: u64,

    /// Talk to the remote course API instead of the local database.
    #[arg(long, global = true)]
    pub remote: bool,

    #[arg(long, env = "LEARN_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "LEARN_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the built-in demo course in the local database.
    Seed,
    /// Store a course JSON document (API format) in the local database.
    Import { path: PathBuf },
    /// Validate a course document and report whether it can be published.
    Check { path: PathBuf },
    Enroll { course: u64 },
    /// Show every lesson with its lock and stage state.
    Status { course: u64 },
    /// Read a lesson introduction and mark it viewed.
    Intro { course: u64, lesson: u64 },
    /// Take a lesson quiz interactively.
    Quiz { course: u64, lesson: u64 },
    /// Submit a file for grading.
    Assignment {
        course: u64,
        lesson: u64,
        file: PathBuf,
    },
    Stats { course: u64 },
    /// Rate a course from 1 to 5 stars. Rating again replaces the old one.
    Rate {
        course: u64,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=5))]
        score: u32,
    },
    /// Rank every enrolled learner of a course.
    Leaderboard {
        course: u64,
        #[arg(long, value_enum, default_value_t = SortBy::Completion)]
        sort: SortBy,
    },
    /// Per-lesson completion and scores across all learners.
    Lessons { course: u64 },
    /// Totals over several courses. Remote mode lets the server pick them.
    Overview { courses: Vec<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    Completion,
    Quiz,
    Assignment,
}

impl From<SortBy> for LeaderboardSort {
    fn from(sort: SortBy) -> Self {
        match sort {
            SortBy::Completion => LeaderboardSort::Completion,
            SortBy::Quiz => LeaderboardSort::QuizScore,
            SortBy::Assignment => LeaderboardSort::AssignmentScore,
        }
    }
}
