//! Integration tests for TaskSyncManager against the in-memory store

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use hackbuddy::config::SyncConfig;
use hackbuddy::domain::{Task, TaskId, TaskStatus};
use hackbuddy::store::MemoryStore;
use hackbuddy::sync::{SyncError, SyncState, TaskSyncManager};

const WAIT: Duration = Duration::from_secs(5);

fn config() -> SyncConfig {
    SyncConfig::default()
}

fn sample_tasks() -> Vec<Task> {
    let now = Utc::now();
    vec![
        Task::with_id("1", "alice", "set up the repo", now - TimeDelta::minutes(10)),
        Task::with_id("2", "bob", "design the logo", now - TimeDelta::minutes(3)),
        Task::with_id("3", "carol", "order pizza", now - TimeDelta::hours(2)).with_status(TaskStatus::Done),
    ]
}

fn spawn(store: &MemoryStore, config: &SyncConfig) -> TaskSyncManager {
    TaskSyncManager::spawn(Arc::new(store.clone()), config)
}

async fn wait_until(manager: &TaskSyncManager, predicate: impl FnMut(&SyncState) -> bool) -> SyncState {
    tokio::time::timeout(WAIT, manager.wait_for(predicate))
        .await
        .expect("state condition not reached in time")
        .expect("sync manager stopped")
}

async fn settled(manager: &TaskSyncManager) -> SyncState {
    wait_until(manager, |s| !s.loading).await
}

async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !check() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn ids(state: &SyncState) -> Vec<&str> {
    state.tasks.iter().map(|t| t.id.as_str()).collect()
}

#[tokio::test]
async fn test_starts_loading_then_loads_newest_first() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());

    let state = settled(&manager).await;

    assert_eq!(ids(&state), vec!["2", "1", "3"]);
    assert_eq!(state.tasks, store.tasks());
    assert!(state.error.is_none());
    assert!(state.live);
    assert!(state.tasks.iter().all(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Done)));
}

#[tokio::test]
async fn test_update_marks_task_done() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    let before = settled(&manager).await;

    manager.update_task_status(&TaskId::from("1"), TaskStatus::Done).await.unwrap();

    let after = manager.state();
    let expected: Vec<Task> = before
        .tasks
        .iter()
        .cloned()
        .map(|t| if t.id.as_str() == "1" { t.with_status(TaskStatus::Done) } else { t })
        .collect();
    assert_eq!(after.tasks, expected);
    assert!(after.error.is_none());
    assert_eq!(store.tasks().iter().find(|t| t.id.as_str() == "1").unwrap().status, TaskStatus::Done);
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;

    let id = TaskId::from("2");
    manager.update_task_status(&id, TaskStatus::Done).await.unwrap();
    let once = manager.state().tasks;
    manager.update_task_status(&id, TaskStatus::Done).await.unwrap();

    assert_eq!(manager.state().tasks, once);
}

#[tokio::test]
async fn test_failed_update_leaves_tasks_unchanged() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    let before = settled(&manager).await;
    store.fail_update_with("permission denied");

    let err = manager
        .update_task_status(&TaskId::from("1"), TaskStatus::Done)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Update(_)));
    let after = manager.state();
    assert_eq!(after.tasks, before.tasks);
    assert_eq!(after.error.as_deref(), Some("permission denied"));
}

#[tokio::test]
async fn test_update_unknown_task_surfaces_error() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    let before = settled(&manager).await;

    let result = manager
        .update_task_status(&TaskId::from("missing"), TaskStatus::Done)
        .await;

    assert!(matches!(result, Err(SyncError::Update(_))));
    let after = manager.state();
    assert_eq!(after.tasks, before.tasks);
    assert_eq!(after.error.as_deref(), Some("Task not found: missing"));
}

#[tokio::test]
async fn test_fetch_failure_sets_error() {
    let store = MemoryStore::with_tasks(sample_tasks());
    store.fail_list_with("network unreachable");
    let manager = spawn(&store, &config());

    let state = settled(&manager).await;

    assert_eq!(state.error.as_deref(), Some("network unreachable"));
    assert!(state.tasks.is_empty());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_tasks() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    let before = settled(&manager).await;

    store.fail_list_with("network unreachable");
    let err = manager.fetch_tasks().await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch(_)));
    let after = manager.state();
    assert_eq!(after.tasks, before.tasks);
    assert_eq!(after.error.as_deref(), Some("network unreachable"));
    assert!(!after.loading);
}

#[tokio::test]
async fn test_manual_retry_clears_error() {
    let store = MemoryStore::with_tasks(sample_tasks());
    store.fail_list_with("network unreachable");
    let manager = spawn(&store, &config());
    settled(&manager).await;

    store.clear_failures();
    manager.fetch_tasks().await.unwrap();

    let state = manager.state();
    assert!(state.error.is_none());
    assert_eq!(state.tasks.len(), 3);
}

#[tokio::test]
async fn test_insert_event_triggers_refetch() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;

    store.insert(Task::with_id("4", "dave", "record the demo", Utc::now()));

    let state = wait_until(&manager, |s| s.tasks.len() == 4).await;
    assert_eq!(ids(&state)[0], "4");
    assert!(state.tasks[0].is_new_at(Utc::now()));
}

#[tokio::test]
async fn test_delete_event_triggers_refetch() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;

    assert!(store.remove(&TaskId::from("2")));

    let state = wait_until(&manager, |s| s.tasks.len() == 2).await;
    assert_eq!(ids(&state), vec!["1", "3"]);
}

#[tokio::test]
async fn test_stale_fetch_does_not_overwrite_newer_one() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;
    let baseline = store.list_calls();

    // A slow refresh reads the table before the insert below
    store.delay_next_list(Duration::from_millis(300));
    let slow = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.fetch_tasks().await })
    };
    eventually(|| store.list_calls() > baseline).await;

    // The insert's change event triggers a newer, fast fetch
    store.insert(Task::with_id("4", "dave", "record the demo", Utc::now()));
    wait_until(&manager, |s| s.tasks.len() == 4).await;

    // The slow caller still gets its own outcome, but its rows are dropped
    slow.await.unwrap().unwrap();
    let state = settled(&manager).await;
    assert_eq!(state.tasks.len(), 4);
    assert_eq!(state.tasks, store.tasks());
}

#[tokio::test]
async fn test_confirmed_update_survives_older_fetch() {
    let store = MemoryStore::with_tasks(sample_tasks());
    // No change feed, so nothing refetches after the write
    store.fail_subscribe_with("realtime disabled");
    let manager = spawn(&store, &config());
    let state = settled(&manager).await;
    assert!(!state.live);
    let baseline = store.list_calls();

    store.delay_next_list(Duration::from_millis(300));
    let slow = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.fetch_tasks().await })
    };
    eventually(|| store.list_calls() > baseline).await;

    manager.update_task_status(&TaskId::from("1"), TaskStatus::Done).await.unwrap();
    slow.await.unwrap().unwrap();

    let state = settled(&manager).await;
    assert_eq!(state.task(&TaskId::from("1")).unwrap().status, TaskStatus::Done);
    assert_eq!(state.tasks, store.tasks());
}

#[tokio::test]
async fn test_confirmed_update_does_not_override_newer_fetch() {
    let store = MemoryStore::with_tasks(sample_tasks());
    store.fail_subscribe_with("realtime disabled");
    let manager = spawn(&store, &config());
    settled(&manager).await;
    let id = TaskId::from("1");

    // The write lands but its confirmation is held back
    store.delay_next_update_reply(Duration::from_millis(100));
    let update = {
        let manager = manager.clone();
        let id = id.clone();
        tokio::spawn(async move { manager.update_task_status(&id, TaskStatus::Done).await })
    };
    eventually(|| store.tasks().iter().any(|t| t.id == id && t.status == TaskStatus::Done)).await;

    // Another client reopens the task before the confirmation arrives
    let mut reopened = store.tasks().into_iter().find(|t| t.id == id).unwrap();
    reopened.status = TaskStatus::Pending;
    store.insert(reopened);

    // This fetch is sent after the write and reads the reopened row
    let baseline = store.list_calls();
    store.delay_next_list(Duration::from_millis(400));
    let fetch = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.fetch_tasks().await })
    };
    eventually(|| store.list_calls() > baseline).await;

    update.await.unwrap().unwrap();
    fetch.await.unwrap().unwrap();

    let state = settled(&manager).await;
    assert_eq!(state.task(&id).unwrap().status, TaskStatus::Pending);
    assert_eq!(state.tasks, store.tasks());
}

#[tokio::test]
async fn test_change_burst_coalesces_refetches() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;
    let baseline = store.list_calls();

    store.delay_next_list(Duration::from_millis(200));
    for i in 0..10 {
        store.insert(Task::with_id(format!("burst-{i}"), "dave", "stand-up note", Utc::now()));
    }

    let state = wait_until(&manager, |s| !s.loading && s.tasks.len() == 13).await;
    assert_eq!(state.tasks, store.tasks());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.list_calls() - baseline, 2);
}

#[tokio::test]
async fn test_hung_fetch_times_out() {
    let store = MemoryStore::with_tasks(sample_tasks());
    store.delay_next_list(Duration::from_secs(30));
    let config = SyncConfig { request_timeout_ms: 50 };
    let manager = spawn(&store, &config);

    let state = settled(&manager).await;

    assert_eq!(state.error.as_deref(), Some("Timeout after 50ms"));
    assert!(!state.loading);
    assert!(state.tasks.is_empty());
}

#[tokio::test]
async fn test_hung_update_times_out() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let config = SyncConfig { request_timeout_ms: 50 };
    let manager = spawn(&store, &config);
    let before = settled(&manager).await;
    store.delay_next_update(Duration::from_secs(30));

    let err = manager
        .update_task_status(&TaskId::from("1"), TaskStatus::Done)
        .await
        .unwrap_err();

    assert!(err.store_error().is_some_and(|e| e.is_timeout()));
    assert_eq!(manager.state().tasks, before.tasks);
}

#[tokio::test]
async fn test_concurrent_fetches_each_resolve() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;

    let (a, b) = tokio::join!(manager.fetch_tasks(), manager.fetch_tasks());

    assert!(a.is_ok());
    assert!(b.is_ok());
    let state = manager.state();
    assert!(!state.loading);
    assert_eq!(state.tasks, store.tasks());
}

#[tokio::test]
async fn test_duplicate_ids_keep_first() {
    let now = Utc::now();
    let store = MemoryStore::with_tasks(vec![
        Task::with_id("dup", "alice", "newer copy", now - TimeDelta::minutes(1)),
        Task::with_id("dup", "alice", "older copy", now - TimeDelta::minutes(5)),
        Task::with_id("solo", "bob", "unique", now - TimeDelta::minutes(3)),
    ]);
    let manager = spawn(&store, &config());

    let state = settled(&manager).await;

    assert_eq!(ids(&state), vec!["dup", "solo"]);
    assert_eq!(state.tasks[0].task, "newer copy");
}

#[tokio::test]
async fn test_works_without_change_feed() {
    let store = MemoryStore::with_tasks(sample_tasks());
    store.fail_subscribe_with("realtime disabled");
    let manager = spawn(&store, &config());

    let state = settled(&manager).await;

    assert!(!state.live);
    assert!(state.error.is_none());
    assert_eq!(state.tasks.len(), 3);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_subscription() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;
    assert_eq!(store.subscriber_count(), 1);

    manager.shutdown().await;
    assert_eq!(store.subscriber_count(), 0);

    // Second shutdown is a no-op and the handle reports the closed channel
    manager.shutdown().await;
    assert!(matches!(manager.fetch_tasks().await, Err(SyncError::ChannelError)));
    assert!(!manager.state().live);
}

#[tokio::test]
async fn test_dropping_handles_releases_subscription() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let manager = spawn(&store, &config());
    settled(&manager).await;
    let clone = manager.clone();
    assert_eq!(store.subscriber_count(), 1);

    drop(manager);
    assert_eq!(store.subscriber_count(), 1);

    drop(clone);
    eventually(|| store.subscriber_count() == 0).await;
}

#[tokio::test]
async fn test_one_subscription_per_manager() {
    let store = MemoryStore::with_tasks(sample_tasks());
    let first = spawn(&store, &config());
    let second = spawn(&store, &config());
    settled(&first).await;
    settled(&second).await;

    assert_eq!(store.subscriber_count(), 2);

    first.fetch_tasks().await.unwrap();
    second.fetch_tasks().await.unwrap();
    assert_eq!(store.subscriber_count(), 2);

    first.shutdown().await;
    assert_eq!(store.subscriber_count(), 1);
    second.shutdown().await;
    assert_eq!(store.subscriber_count(), 0);
}
