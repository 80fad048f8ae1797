//! Change feed subscription handle

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::TaskId;

/// Kind of row change on the task table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parse a change-feed event type (`INSERT`, `update`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One notification from the change feed
///
/// The payload is informational only; consumers refetch the whole table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Affected row, when the feed carries it
    pub task_id: Option<TaskId>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, task_id: Option<TaskId>) -> Self {
        Self { kind, task_id }
    }
}

/// Live subscription to the change feed
///
/// Released exactly once: by [`Subscription::unsubscribe`], or on drop if it
/// was never called.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap an event receiver with the action that tears the feed down
    pub fn new(events: mpsc::Receiver<ChangeEvent>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next change; `None` once the feed has closed
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Tear the feed down
    pub fn unsubscribe(mut self) {
        debug!("unsubscribe: called");
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            debug!("release: tearing down change feed");
            self.events.close();
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}
