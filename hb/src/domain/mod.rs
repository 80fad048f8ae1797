//! Domain types for HackBuddy
//!
//! The task data contract shared by the sync manager and the presentation
//! layer: the Task record, its closed status enum, the opaque task id, and
//! the values derived from them at render time (age, "is new", stats).

mod humanize;
mod id;
mod stats;
mod task;

pub use humanize::{format_distance, format_relative};
pub use id::TaskId;
pub use stats::TaskStats;
pub use task::{NEW_TASK_WINDOW, ParseStatusError, Task, TaskStatus};
