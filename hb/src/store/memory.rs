//! In-memory task store
//!
//! Same contract as the remote table: rows sorted newest first, status
//! updates, and a change feed fanned out to every live subscriber. Used for
//! offline demos (optionally seeded from a JSON file) and for exercising the
//! sync manager against failures and slow responses.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ChangeEvent, ChangeKind, StoreError, Subscription, TaskStore};
use crate::domain::{Task, TaskId, TaskStatus};

/// Buffered change events per subscriber before new ones are dropped
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    subscribers: HashMap<u64, mpsc::Sender<ChangeEvent>>,
    next_subscriber_id: u64,
    list_failure: Option<String>,
    update_failure: Option<String>,
    subscribe_failure: Option<String>,
    list_delays: VecDeque<Duration>,
    update_delays: VecDeque<Duration>,
    update_reply_delays: VecDeque<Duration>,
}

impl Inner {
    fn notify(&mut self, event: ChangeEvent) {
        debug!(kind = %event.kind, subscribers = self.subscribers.len(), "notify: called");
        self.subscribers
            .retain(|_, tx| !matches!(tx.try_send(event.clone()), Err(mpsc::error::TrySendError::Closed(_))));
    }

    fn sort(&mut self) {
        self.tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// Seed file row; `id`, `status` and `created_at` may be left out
#[derive(Deserialize)]
struct SeedRow {
    #[serde(default)]
    id: Option<TaskId>,
    user: String,
    task: String,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl From<SeedRow> for Task {
    fn from(row: SeedRow) -> Self {
        let id = row.id.unwrap_or_else(TaskId::generate);
        Task::with_id(id, row.user, row.task, row.created_at).with_status(row.status)
    }
}

/// Task table held in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    list_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `tasks`
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            inner.tasks = tasks;
            inner.sort();
        }
        store
    }

    /// Load a JSON array of tasks
    ///
    /// Rows without an `id` get a freshly minted one, like rows inserted into
    /// the remote table.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "from_seed_file: called");
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("Failed to read seed file {}: {}", path.display(), e)))?;
        let rows: Vec<SeedRow> = serde_json::from_str(&content)?;
        let tasks: Vec<Task> = rows.into_iter().map(Task::from).collect();
        info!(count = tasks.len(), path = %path.display(), "Loaded seed tasks");
        Ok(Self::with_tasks(tasks))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not wedge every other handle.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the stored rows, newest first
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Add a row and notify subscribers
    pub fn insert(&self, task: Task) {
        debug!(id = %task.id, "insert: called");
        let mut inner = self.lock();
        let id = task.id.clone();
        inner.tasks.retain(|t| t.id != id);
        inner.tasks.push(task);
        inner.sort();
        inner.notify(ChangeEvent::new(ChangeKind::Insert, Some(id)));
    }

    /// Remove a row and notify subscribers; returns whether it existed
    pub fn remove(&self, id: &TaskId) -> bool {
        debug!(%id, "remove: called");
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| &t.id != id);
        let removed = inner.tasks.len() != before;
        if removed {
            inner.notify(ChangeEvent::new(ChangeKind::Delete, Some(id.clone())));
        }
        removed
    }

    /// Make every `list` call fail with `message` until cleared
    pub fn fail_list_with(&self, message: impl Into<String>) {
        self.lock().list_failure = Some(message.into());
    }

    /// Make every `update_status` call fail with `message` until cleared
    pub fn fail_update_with(&self, message: impl Into<String>) {
        self.lock().update_failure = Some(message.into());
    }

    /// Make every `subscribe` call fail with `message` until cleared
    pub fn fail_subscribe_with(&self, message: impl Into<String>) {
        self.lock().subscribe_failure = Some(message.into());
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.list_failure = None;
        inner.update_failure = None;
        inner.subscribe_failure = None;
    }

    /// Delay the next `list` response by `delay`
    ///
    /// The rows are read when the call starts, so a delayed response carries
    /// the table as it was before anything that happens during the delay.
    pub fn delay_next_list(&self, delay: Duration) {
        self.lock().list_delays.push_back(delay);
    }

    /// Delay the next `update_status` call by `delay` before it is applied
    pub fn delay_next_update(&self, delay: Duration) {
        self.lock().update_delays.push_back(delay);
    }

    /// Hold the next successful `update_status` reply by `delay`
    ///
    /// The write is applied first, so the row changes while the caller is
    /// still waiting for confirmation.
    pub fn delay_next_update_reply(&self, delay: Duration) {
        self.lock().update_reply_delays.push_back(delay);
    }

    /// Number of `list` calls started so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_status` calls started so far
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Number of subscriptions not yet released
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|_, tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let (result, delay) = {
            let mut inner = self.lock();
            let result = match &inner.list_failure {
                Some(message) => Err(StoreError::Remote(message.clone())),
                None => Ok(inner.tasks.clone()),
            };
            // Counted under the lock so a caller that saw the count also
            // knows the snapshot has been taken.
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            (result, inner.list_delays.pop_front())
        };
        debug!(?delay, ok = result.is_ok(), "list: called");

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        debug!(%id, %status, "update_status: called");
        let delay = self.lock().update_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply_delay = {
            let mut inner = self.lock();
            if let Some(message) = &inner.update_failure {
                return Err(StoreError::Remote(message.clone()));
            }
            let task = inner
                .tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.status = status;
            inner.notify(ChangeEvent::new(ChangeKind::Update, Some(id.clone())));
            inner.update_reply_delays.pop_front()
        };

        if let Some(delay) = reply_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription, StoreError> {
        let mut inner = self.lock();
        if let Some(message) = &inner.subscribe_failure {
            return Err(StoreError::Remote(message.clone()));
        }
        let subscriber_id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        inner.subscribers.insert(subscriber_id, tx);
        debug!(subscriber_id, "subscribe: registered");

        let registry = self.inner.clone();
        Ok(Subscription::new(rx, move || {
            let mut inner = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            inner.subscribers.remove(&subscriber_id);
            debug!(subscriber_id, "subscribe: released");
        }))
    }
}
