//! TUI Runner - main loop that owns the terminal and follows the sync manager
//!
//! Redraws on every terminal event and on every published sync state. User
//! actions are handed to the manager on their own tasks so the loop keeps
//! drawing while a request is outstanding; their outcome comes back through
//! the sync state.

use std::time::Duration;

use chrono::Utc;
use eyre::Result;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::TaskStatus;
use crate::sync::{SyncState, TaskSyncManager};

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::state::PendingAction;
use super::views;

/// TUI Runner that manages the terminal and event loop
pub struct TuiRunner {
    app: App,
    terminal: Tui,
    manager: TaskSyncManager,
    state_rx: watch::Receiver<SyncState>,
    event_handler: EventHandler,
}

impl TuiRunner {
    pub fn new(terminal: Tui, manager: TaskSyncManager, tick_rate: Duration) -> Self {
        let state_rx = manager.watch();
        Self {
            app: App::new(),
            terminal,
            manager,
            state_rx,
            event_handler: EventHandler::new(tick_rate),
        }
    }

    /// Run the TUI main loop
    pub async fn run(&mut self) -> Result<()> {
        debug!("run: called");
        let initial = self.state_rx.borrow_and_update().clone();
        self.app.state_mut().apply_sync(initial);
        let mut sync_open = true;

        loop {
            self.terminal.draw(|frame| views::render(self.app.state(), frame))?;

            tokio::select! {
                event = self.event_handler.next() => {
                    match event? {
                        Event::Tick => self.app.state_mut().tick(Utc::now()),
                        Event::Key(key) => {
                            if self.app.handle_key(key) {
                                break;
                            }
                        }
                        Event::Resize(width, height) => {
                            debug!(width, height, "run: resize");
                        }
                    }
                }
                changed = self.state_rx.changed(), if sync_open => {
                    match changed {
                        Ok(()) => {
                            let sync = self.state_rx.borrow_and_update().clone();
                            self.app.state_mut().apply_sync(sync);
                        }
                        Err(_) => {
                            warn!("Sync manager stopped, dashboard no longer updating");
                            sync_open = false;
                        }
                    }
                }
            }

            if let Some(action) = self.app.state_mut().pending_action.take() {
                self.execute_action(action);
            }

            if self.app.state().should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Execute a pending action
    fn execute_action(&self, action: PendingAction) {
        debug!(?action, "execute_action: called");
        let manager = self.manager.clone();
        match action {
            PendingAction::Refresh => {
                tokio::spawn(async move {
                    if let Err(e) = manager.fetch_tasks().await {
                        debug!(error = %e, "execute_action: refresh failed");
                    }
                });
            }
            PendingAction::MarkDone(id) => {
                tokio::spawn(async move {
                    if let Err(e) = manager.update_task_status(&id, TaskStatus::Done).await {
                        debug!(%id, error = %e, "execute_action: mark done failed");
                    }
                });
            }
        }
    }
}
