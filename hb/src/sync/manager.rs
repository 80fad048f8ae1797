//! TaskSyncManager - actor that mirrors the remote task table
//!
//! The actor owns the task list and the change-feed subscription. Remote
//! calls run as child tasks in a `JoinSet` so commands and change events keep
//! flowing while a request is outstanding; their results are applied by the
//! actor in completion order.
//!
//! Every fetch gets a sequence number. A result is applied only when it is
//! newer than the last applied one, so a slow response can never overwrite a
//! fresher one. A confirmed status write is replayed over the results of
//! fetches that were already in flight when the write was sent, since those
//! may have read the table before the write landed. Fetches issued later
//! read the table as it is and are published untouched.
//!
//! Change events coalesce: while a change-triggered fetch is outstanding,
//! further events only mark the list dirty, and one follow-up fetch is issued
//! when it completes.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::messages::{SyncCommand, SyncError, SyncResponse};
use super::state::SyncState;
use crate::config::SyncConfig;
use crate::domain::{Task, TaskId, TaskStatus};
use crate::store::{ChangeEvent, StoreError, Subscription, TaskStore};

/// Command queue depth
const COMMAND_BUFFER: usize = 64;

/// Handle to send commands to the sync actor
///
/// Cheap to clone. The actor shuts down on [`TaskSyncManager::shutdown`] or
/// once every handle is dropped, releasing the change feed either way.
#[derive(Clone)]
pub struct TaskSyncManager {
    tx: mpsc::Sender<SyncCommand>,
    state_rx: watch::Receiver<SyncState>,
}

impl TaskSyncManager {
    /// Spawn the actor
    ///
    /// Activation (subscribing to the change feed, then the initial fetch)
    /// happens on the actor task; the returned state starts out loading.
    pub fn spawn(store: Arc<dyn TaskStore>, config: &SyncConfig) -> Self {
        debug!(request_timeout_ms = config.request_timeout_ms, "spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(SyncState::default());

        let actor = SyncActor {
            store,
            request_timeout: config.request_timeout(),
            state_tx,
            calls: JoinSet::new(),
            subscription: None,
            issued_seq: 0,
            applied_seq: 0,
            in_flight: HashSet::new(),
            confirmed: Vec::new(),
            change_fetch: None,
            dirty: false,
        };
        tokio::spawn(actor.run(rx));

        info!("TaskSyncManager spawned");
        Self { tx, state_rx }
    }

    /// Current state snapshot
    pub fn state(&self) -> SyncState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    /// Wait until the state satisfies `predicate`, returning that state
    pub async fn wait_for(&self, predicate: impl FnMut(&SyncState) -> bool) -> SyncResponse<SyncState> {
        debug!("wait_for: called");
        let mut rx = self.state_rx.clone();
        let state = rx.wait_for(predicate).await.map_err(|_| SyncError::ChannelError)?.clone();
        Ok(state)
    }

    /// Refetch the whole task list and wait for this request's outcome
    ///
    /// The outcome is this request's own even when a newer fetch made its
    /// result stale.
    pub async fn fetch_tasks(&self) -> SyncResponse<()> {
        debug!("fetch_tasks: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::FetchTasks { reply: reply_tx })
            .await
            .map_err(|_| SyncError::ChannelError)?;
        reply_rx.await.map_err(|_| SyncError::ChannelError)?
    }

    /// Write a task's status remotely, then mirror it locally
    pub async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> SyncResponse<()> {
        debug!(%id, %status, "update_task_status: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::UpdateTaskStatus {
                id: id.clone(),
                status,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SyncError::ChannelError)?;
        reply_rx.await.map_err(|_| SyncError::ChannelError)?
    }

    /// Stop the actor and release the change feed
    ///
    /// Outstanding remote calls are aborted. Returns once teardown is done;
    /// calling it on a stopped manager is a no-op.
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Shutdown { reply: reply_tx }).await.is_ok() {
            let _ = reply_rx.await;
        }
    }
}

/// A confirmed status write, replayed onto fetches numbered up to and
/// including `up_to_seq` (the last fetch issued before the write was sent)
#[derive(Debug, Clone)]
struct ConfirmedWrite {
    up_to_seq: u64,
    id: TaskId,
    status: TaskStatus,
}

/// Finished remote call, applied by the actor
enum Completion {
    Fetch {
        seq: u64,
        result: Result<Vec<Task>, StoreError>,
        reply: Option<oneshot::Sender<SyncResponse<()>>>,
    },
    Update {
        id: TaskId,
        status: TaskStatus,
        sent_after_seq: u64,
        result: Result<(), StoreError>,
        reply: oneshot::Sender<SyncResponse<()>>,
    },
}

/// What woke the actor up
enum Step {
    Command(Option<SyncCommand>),
    Completed(Result<Completion, JoinError>),
    Change(Option<ChangeEvent>),
}

struct SyncActor {
    store: Arc<dyn TaskStore>,
    request_timeout: Duration,
    state_tx: watch::Sender<SyncState>,
    calls: JoinSet<Completion>,
    subscription: Option<Subscription>,
    issued_seq: u64,
    applied_seq: u64,
    in_flight: HashSet<u64>,
    confirmed: Vec<ConfirmedWrite>,
    /// Outstanding fetch triggered by the change feed
    change_fetch: Option<u64>,
    /// A change arrived while `change_fetch` was outstanding
    dirty: bool,
}

impl SyncActor {
    async fn run(mut self, mut rx: mpsc::Receiver<SyncCommand>) {
        debug!("run: called");
        self.activate().await;

        let mut shutdown_reply = None;
        loop {
            let step = tokio::select! {
                cmd = rx.recv() => Step::Command(cmd),
                Some(done) = self.calls.join_next(), if !self.calls.is_empty() => Step::Completed(done),
                change = next_change(self.subscription.as_mut()) => Step::Change(change),
            };

            match step {
                Step::Command(None) => {
                    debug!("run: all handles dropped");
                    break;
                }
                Step::Command(Some(SyncCommand::Shutdown { reply })) => {
                    debug!("run: Shutdown command");
                    shutdown_reply = Some(reply);
                    break;
                }
                Step::Command(Some(SyncCommand::FetchTasks { reply })) => {
                    debug!("run: FetchTasks command");
                    self.issue_fetch(Some(reply));
                }
                Step::Command(Some(SyncCommand::UpdateTaskStatus { id, status, reply })) => {
                    debug!(%id, %status, "run: UpdateTaskStatus command");
                    self.issue_update(id, status, reply);
                }
                Step::Completed(Ok(completion)) => self.complete(completion),
                Step::Completed(Err(e)) => {
                    // A panicked fetch would otherwise pin `loading` on
                    warn!(error = %e, "Remote call task failed");
                    self.in_flight.clear();
                    self.confirmed.clear();
                    self.change_fetch = None;
                    self.state_tx.send_modify(|s| s.loading = false);
                    if std::mem::take(&mut self.dirty) {
                        self.issue_change_fetch();
                    }
                }
                Step::Change(Some(event)) => {
                    debug!(kind = %event.kind, task_id = ?event.task_id, "run: change event");
                    if self.change_fetch.is_some() {
                        self.dirty = true;
                    } else {
                        self.issue_change_fetch();
                    }
                }
                Step::Change(None) => {
                    warn!("Change feed closed, live updates stopped");
                    self.subscription = None;
                    self.state_tx.send_modify(|s| s.live = false);
                }
            }
        }

        self.teardown();
        drop(rx);
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    /// Subscribe to the change feed, then load the initial list
    async fn activate(&mut self) {
        debug!("activate: called");
        match bounded(self.request_timeout, self.store.subscribe()).await {
            Ok(subscription) => {
                info!("Subscribed to task changes");
                self.subscription = Some(subscription);
                self.state_tx.send_modify(|s| s.live = true);
            }
            Err(e) => {
                warn!(error = %e, "Failed to subscribe to task changes, continuing without live updates");
                self.state_tx.send_modify(|s| s.live = false);
            }
        }
        self.issue_fetch(None);
    }

    fn teardown(&mut self) {
        debug!("teardown: called");
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.calls.abort_all();
        self.state_tx.send_modify(|s| s.live = false);
        info!("TaskSyncManager stopped");
    }

    fn issue_change_fetch(&mut self) {
        self.change_fetch = Some(self.issue_fetch(None));
    }

    fn issue_fetch(&mut self, reply: Option<oneshot::Sender<SyncResponse<()>>>) -> u64 {
        self.issued_seq += 1;
        let seq = self.issued_seq;
        debug!(seq, "issue_fetch: called");
        self.in_flight.insert(seq);
        self.state_tx.send_modify(|s| s.loading = true);

        let store = self.store.clone();
        let timeout = self.request_timeout;
        self.calls.spawn(async move {
            let result = bounded(timeout, store.list()).await;
            Completion::Fetch { seq, result, reply }
        });
        seq
    }

    fn issue_update(&mut self, id: TaskId, status: TaskStatus, reply: oneshot::Sender<SyncResponse<()>>) {
        let sent_after_seq = self.issued_seq;
        debug!(%id, sent_after_seq, "issue_update: called");
        let store = self.store.clone();
        let timeout = self.request_timeout;
        self.calls.spawn(async move {
            let result = bounded(timeout, store.update_status(&id, status)).await;
            Completion::Update {
                id,
                status,
                sent_after_seq,
                result,
                reply,
            }
        });
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Fetch { seq, result, reply } => {
                if self.change_fetch == Some(seq) {
                    self.change_fetch = None;
                    if std::mem::take(&mut self.dirty) {
                        debug!(seq, "complete: changes arrived during fetch, refetching");
                        self.issue_change_fetch();
                    }
                }
                let outcome = self.apply_fetch(seq, result);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Completion::Update {
                id,
                status,
                sent_after_seq,
                result,
                reply,
            } => {
                let _ = reply.send(self.apply_update(id, status, sent_after_seq, result));
            }
        }
    }

    fn apply_fetch(&mut self, seq: u64, result: Result<Vec<Task>, StoreError>) -> SyncResponse<()> {
        self.in_flight.remove(&seq);
        let loading = !self.in_flight.is_empty();
        let fresh = seq > self.applied_seq;

        match result {
            Ok(tasks) if fresh => {
                debug!(seq, count = tasks.len(), "apply_fetch: applying");
                self.applied_seq = seq;
                let tasks = reconcile(tasks, &self.confirmed, seq);
                self.prune_confirmed();
                self.state_tx.send_modify(|s| {
                    s.tasks = tasks;
                    s.error = None;
                    s.loading = loading;
                });
                Ok(())
            }
            Ok(_) => {
                debug!(seq, applied_seq = self.applied_seq, "apply_fetch: discarding stale result");
                self.prune_confirmed();
                self.state_tx.send_modify(|s| s.loading = loading);
                Ok(())
            }
            Err(e) => {
                warn!(seq, error = %e, "Failed to fetch tasks");
                self.prune_confirmed();
                let message = e.to_string();
                self.state_tx.send_modify(|s| {
                    if fresh {
                        s.error = Some(message);
                    }
                    s.loading = loading;
                });
                Err(SyncError::Fetch(e))
            }
        }
    }

    fn apply_update(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        sent_after_seq: u64,
        result: Result<(), StoreError>,
    ) -> SyncResponse<()> {
        match result {
            Ok(()) => {
                debug!(%id, %status, "apply_update: confirmed");
                self.state_tx.send_modify(|s| {
                    if let Some(task) = s.tasks.iter_mut().find(|t| t.id == id) {
                        task.status = status;
                    }
                    s.error = None;
                });
                if self.in_flight.iter().any(|&seq| seq <= sent_after_seq) {
                    self.confirmed.push(ConfirmedWrite {
                        up_to_seq: sent_after_seq,
                        id,
                        status,
                    });
                }
                Ok(())
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to update task");
                let message = e.to_string();
                self.state_tx.send_modify(|s| s.error = Some(message));
                Err(SyncError::Update(e))
            }
        }
    }

    /// Forget writes no outstanding fetch can still be missing
    fn prune_confirmed(&mut self) {
        let in_flight = &self.in_flight;
        self.confirmed.retain(|w| in_flight.iter().any(|&seq| seq <= w.up_to_seq));
    }
}

/// Run a remote call under the request timeout
async fn bounded<T>(timeout: Duration, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

async fn next_change(subscription: Option<&mut Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

/// Prepare fetch `seq`'s rows for publishing
///
/// Drops duplicate ids (first wins) and replays confirmed writes that the
/// fetch may have missed.
fn reconcile(tasks: Vec<Task>, confirmed: &[ConfirmedWrite], seq: u64) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let mut tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|task| {
            let first = seen.insert(task.id.clone());
            if !first {
                warn!(id = %task.id, "Duplicate task id in fetch result, keeping the first");
            }
            first
        })
        .collect();

    for write in confirmed.iter().filter(|w| w.up_to_seq >= seq) {
        if let Some(task) = tasks.iter_mut().find(|t| t.id == write.id) {
            task.status = write.status;
        }
    }
    tasks
}
