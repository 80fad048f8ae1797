//! HackBuddy - live dashboard for hackathon tasks
//!
//! Tasks are captured from a team chat into a hosted table. HackBuddy keeps a
//! local replica of that table, follows its change feed, and lets the team
//! mark tasks done from a terminal dashboard or the command line.
//!
//! # Modules
//!
//! - [`domain`] - Task, status, id, stats and relative time formatting
//! - [`store`] - Remote store trait with HTTP and in-memory implementations
//! - [`sync`] - Actor that mirrors the remote table and applies updates
//! - [`tui`] - Terminal dashboard
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod store;
pub mod sync;
pub mod tui;

pub use config::Config;
pub use domain::{Task, TaskId, TaskStats, TaskStatus};
pub use store::{MemoryStore, RestStore, StoreError, TaskStore, create_store};
pub use sync::{SyncError, SyncState, TaskSyncManager};
