//! HackBuddy - live dashboard for hackathon tasks
//!
//! CLI entry point: the interactive dashboard plus a few one-shot commands.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use hackbuddy::cli::{Cli, Command, OutputFormat};
use hackbuddy::config::Config;
use hackbuddy::domain::{Task, TaskId, TaskStatus};
use hackbuddy::store::create_store;
use hackbuddy::sync::{SyncState, TaskSyncManager};
use hackbuddy::tui;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hackbuddy")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, never stdout: the dashboard owns the terminal
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("hackbuddy.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "HackBuddy loaded config: backend={:?}, table={}",
        config.store.backend, config.store.table
    );

    let store = create_store(&config.store).context("Failed to create task store")?;
    let manager = TaskSyncManager::spawn(store, &config.sync);

    let result = match cli.command {
        None | Some(Command::Dashboard) => tui::run(manager.clone(), &config.dashboard).await,
        Some(Command::List { status, format }) => cmd_list(&manager, status, format).await,
        Some(Command::Stats { format }) => cmd_stats(&manager, format).await,
        Some(Command::Done { id }) => cmd_set_status(&manager, &id, TaskStatus::Done).await,
        Some(Command::Reopen { id }) => cmd_set_status(&manager, &id, TaskStatus::Pending).await,
        Some(Command::Watch) => cmd_watch(&manager).await,
    };

    manager.shutdown().await;
    result
}

/// Wait for the first fetch to finish and fail if it did
async fn settled(manager: &TaskSyncManager) -> Result<SyncState> {
    let state = manager.wait_for(|s| !s.loading).await?;
    if let Some(error) = &state.error {
        eyre::bail!("Failed to fetch tasks: {}", error);
    }
    Ok(state)
}

fn print_task(task: &Task) {
    let now = Utc::now();
    let marker = match task.status {
        TaskStatus::Pending => "○".yellow(),
        TaskStatus::Done => "✓".green(),
    };
    let new = if task.is_pending() && task.is_new_at(now) {
        format!(" {}", "NEW".cyan().bold())
    } else {
        String::new()
    };
    println!(
        "{} {} {}: {} {}{}",
        marker,
        task.id.short().dimmed(),
        task.user.bold(),
        task.task,
        format!("({})", task.timestamp_at(now)).dimmed(),
        new
    );
}

async fn cmd_list(manager: &TaskSyncManager, status: Option<TaskStatus>, format: OutputFormat) -> Result<()> {
    let state = settled(manager).await?;
    let tasks: Vec<&Task> = state
        .tasks
        .iter()
        .filter(|t| status.is_none_or(|s| t.status == s))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in tasks {
                print_task(task);
            }
        }
    }
    Ok(())
}

async fn cmd_stats(manager: &TaskSyncManager, format: OutputFormat) -> Result<()> {
    let state = settled(manager).await?;
    let stats = state.stats(Utc::now());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("{:12} {}", "Total Tasks".bold(), stats.total);
            println!("{:12} {}", "Pending".yellow(), stats.pending);
            println!("{:12} {}", "Completed".green(), stats.completed);
            println!("{:12} {}", "New Tasks".cyan(), stats.new);
        }
    }
    Ok(())
}

async fn cmd_set_status(manager: &TaskSyncManager, id: &TaskId, status: TaskStatus) -> Result<()> {
    manager
        .update_task_status(id, status)
        .await
        .context(format!("Failed to mark task {} {}", id, status))?;
    println!("{} Task {} is now {}", "✓".green(), id, status.label().to_lowercase());
    Ok(())
}

async fn cmd_watch(manager: &TaskSyncManager) -> Result<()> {
    let mut state = settled(manager).await?;
    if !state.live {
        println!("{} Live updates unavailable, showing a single snapshot", "!".yellow());
        println!("{}", state.stats(Utc::now()));
        return Ok(());
    }
    println!("{}", state.stats(Utc::now()));

    let mut rx = manager.watch();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = rx.borrow_and_update().clone();
                if let Some(error) = &next.error
                    && next.error != state.error
                {
                    println!("{} {}", "error:".red(), error);
                }
                if next.tasks != state.tasks {
                    println!("{}", next.stats(Utc::now()));
                }
                if !next.live {
                    println!("{} Change feed closed", "!".yellow());
                    break;
                }
                state = next;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
