//! Published sync state

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskId, TaskStats};

/// Snapshot of everything the presentation layer reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// Tasks in the order of the last applied fetch (newest first)
    pub tasks: Vec<Task>,
    /// A fetch is in flight
    pub loading: bool,
    /// Message of the last failed operation, cleared by the next success
    pub error: Option<String>,
    /// The change feed is established
    pub live: bool,
}

impl Default for SyncState {
    /// Nothing fetched yet, so loading
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            loading: true,
            error: None,
            live: false,
        }
    }
}

impl SyncState {
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_pending())
    }

    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_done())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        TaskStats::compute(&self.tasks, now)
    }
}
