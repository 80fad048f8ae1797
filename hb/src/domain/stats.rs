//! Aggregate counts shown in the dashboard header

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::task::Task;

/// Counts over a task collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// All tasks
    pub total: usize,
    /// Tasks still pending
    pub pending: usize,
    /// Tasks marked done
    pub completed: usize,
    /// Tasks of either status created inside the new-task window
    pub new: usize,
}

impl TaskStats {
    /// Compute the counts as of `now`
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        tasks.iter().fold(Self::default(), |mut stats, task| {
            stats.total += 1;
            if task.is_pending() {
                stats.pending += 1;
            } else {
                stats.completed += 1;
            }
            if task.is_new_at(now) {
                stats.new += 1;
            }
            stats
        })
    }
}

impl std::fmt::Display for TaskStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total: {}  pending: {}  completed: {}  new: {}",
            self.total, self.pending, self.completed, self.new
        )
    }
}
