//! Task domain type
//!
//! A task captured from chat. The remote table creates and owns every task;
//! the client only ever holds a read replica and changes `status`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::humanize::format_relative;
use super::id::TaskId;

/// Age under which a task is shown as new
pub const NEW_TASK_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Task status
///
/// Closed set: the table has no other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting to be picked up
    #[default]
    Pending,
    /// Marked done by someone
    Done,
}

impl TaskStatus {
    /// Wire value, as stored in the table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    /// Human label for badges and headings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Done => "Completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a status string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status: {0}. Use: pending or done")]
pub struct ParseStatusError(String);

impl std::str::FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "done" | "completed" => Ok(Self::Done),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, stable for the task's lifetime
    pub id: TaskId,

    /// Display name of whoever posted the task
    pub user: String,

    /// Free-text description
    pub task: String,

    /// Current status
    pub status: TaskStatus,

    /// Creation timestamp, drives ordering and the "new" flag
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create with a specific id and creation time (for tests and seeds)
    pub fn with_id(id: impl Into<TaskId>, user: impl Into<String>, task: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            task: task.into(),
            status: TaskStatus::Pending,
            created_at,
        }
    }

    /// Builder-style status override
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Whether the task was created less than [`NEW_TASK_WINDOW`] before `now`
    ///
    /// Exactly five minutes old is no longer new. A creation time ahead of
    /// `now` (clock skew between us and the table) counts as new.
    pub fn is_new_at(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now.signed_duration_since(self.created_at).num_milliseconds();
        age_ms < NEW_TASK_WINDOW.as_millis() as i64
    }

    /// Relative creation time, e.g. "3 minutes ago"
    pub fn timestamp_at(&self, now: DateTime<Utc>) -> String {
        format_relative(self.created_at, now)
    }
}
