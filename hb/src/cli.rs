//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::{TaskId, TaskStatus};

/// HackBuddy - hackathon task dashboard
#[derive(Parser)]
#[command(
    name = "hb",
    about = "Live dashboard for hackathon tasks captured from chat",
    version,
    after_help = "Logs are written to: ~/.local/share/hackbuddy/logs/hackbuddy.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute (defaults to the dashboard)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard
    Dashboard,

    /// List tasks, newest first
    List {
        /// Only show tasks with this status (pending or done)
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show task counts
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a task done
    Done {
        /// Task ID
        id: TaskId,
    },

    /// Mark a task pending again
    Reopen {
        /// Task ID
        id: TaskId,
    },

    /// Stay connected and print counts whenever tasks change
    Watch,
}

/// Output format for list/stats commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
