//! Dashboard state
//!
//! Everything the views need: the latest sync snapshot, the clock used for
//! relative timestamps, which column has focus, and per-column selection.

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskId, TaskStats, TaskStatus};
use crate::sync::SyncState;

/// Dashboard column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Column {
    #[default]
    Pending,
    Completed,
}

impl Column {
    pub fn other(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Pending => "Pending Tasks",
            Self::Completed => "Completed Tasks",
        }
    }
}

/// Something the user can do to a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    MarkDone,
}

impl CardAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::MarkDone => "Mark as Done",
        }
    }
}

/// A task as rendered in a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: TaskId,
    pub user: String,
    pub task: String,
    pub status: TaskStatus,
    /// Relative creation time, e.g. "3 minutes ago"
    pub timestamp: String,
    pub is_new: bool,
    pub action: Option<CardAction>,
}

impl TaskCard {
    /// Card for the pending column: can be marked done, highlights new tasks
    pub fn pending(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: task.id.clone(),
            user: task.user.clone(),
            task: task.task.clone(),
            status: task.status,
            timestamp: task.timestamp_at(now),
            is_new: task.is_new_at(now),
            action: Some(CardAction::MarkDone),
        }
    }

    /// Card for the completed column: read only
    pub fn completed(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: task.id.clone(),
            user: task.user.clone(),
            task: task.task.clone(),
            status: task.status,
            timestamp: task.timestamp_at(now),
            is_new: false,
            action: None,
        }
    }
}

/// Action pending execution by the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Refresh,
    MarkDone(TaskId),
}

/// Interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Normal,
    Help,
}

/// What fills the main area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Nothing to show yet
    Loading,
    /// Nothing to show because the last operation failed
    Error(String),
    /// Stats and columns, with the error as a banner if there is one
    Board,
}

/// Selection state for a column
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub selected_index: usize,
}

impl SelectionState {
    pub fn select_next(&mut self, max_items: usize) {
        if max_items > 0 && self.selected_index < max_items - 1 {
            self.selected_index += 1;
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    pub fn select_last(&mut self, max_items: usize) {
        if max_items > 0 {
            self.selected_index = max_items - 1;
        }
    }

    /// Ensure selection is within bounds
    pub fn clamp(&mut self, max_items: usize) {
        if max_items == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= max_items {
            self.selected_index = max_items - 1;
        }
    }
}

/// Main dashboard state
#[derive(Debug)]
pub struct DashboardState {
    /// Latest snapshot from the sync manager
    pub sync: SyncState,
    /// Clock for "is new" and relative timestamps, advanced on tick
    pub now: DateTime<Utc>,
    pub focus: Column,
    pub pending_selection: SelectionState,
    pub completed_selection: SelectionState,
    pub interaction_mode: InteractionMode,
    pub should_quit: bool,
    /// Picked up and executed by the runner
    pub pending_action: Option<PendingAction>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            sync: SyncState::default(),
            now: Utc::now(),
            focus: Column::Pending,
            pending_selection: SelectionState::default(),
            completed_selection: SelectionState::default(),
            interaction_mode: InteractionMode::Normal,
            should_quit: false,
            pending_action: None,
        }
    }

    /// Take a new snapshot from the sync manager
    ///
    /// Keeps the selection on the same task when it is still in its column.
    pub fn apply_sync(&mut self, sync: SyncState) {
        let pending_id = self.selected_id_in(Column::Pending);
        let completed_id = self.selected_id_in(Column::Completed);
        self.sync = sync;

        for (column, id) in [(Column::Pending, pending_id), (Column::Completed, completed_id)] {
            let index = id.and_then(|id| self.column_tasks(column).position(|t| t.id == id));
            let count = self.item_count(column);
            let selection = self.selection_mut(column);
            if let Some(index) = index {
                selection.selected_index = index;
            }
            selection.clamp(count);
        }
    }

    /// Periodic update
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn screen(&self) -> Screen {
        if !self.sync.tasks.is_empty() {
            return Screen::Board;
        }
        match &self.sync.error {
            Some(error) if !self.sync.loading => Screen::Error(error.clone()),
            _ if self.sync.loading => Screen::Loading,
            _ => Screen::Board,
        }
    }

    pub fn stats(&self) -> TaskStats {
        self.sync.stats(self.now)
    }

    fn column_tasks(&self, column: Column) -> Box<dyn Iterator<Item = &Task> + '_> {
        match column {
            Column::Pending => Box::new(self.sync.pending()),
            Column::Completed => Box::new(self.sync.completed()),
        }
    }

    /// Cards for a column, in sync order
    pub fn cards(&self, column: Column) -> Vec<TaskCard> {
        let now = self.now;
        match column {
            Column::Pending => self.sync.pending().map(|t| TaskCard::pending(t, now)).collect(),
            Column::Completed => self.sync.completed().map(|t| TaskCard::completed(t, now)).collect(),
        }
    }

    pub fn item_count(&self, column: Column) -> usize {
        self.column_tasks(column).count()
    }

    pub fn selection(&self, column: Column) -> &SelectionState {
        match column {
            Column::Pending => &self.pending_selection,
            Column::Completed => &self.completed_selection,
        }
    }

    pub fn selection_mut(&mut self, column: Column) -> &mut SelectionState {
        match column {
            Column::Pending => &mut self.pending_selection,
            Column::Completed => &mut self.completed_selection,
        }
    }

    fn selected_id_in(&self, column: Column) -> Option<TaskId> {
        let index = self.selection(column).selected_index;
        self.column_tasks(column).nth(index).map(|t| t.id.clone())
    }

    /// Card under the cursor in the focused column
    pub fn selected_card(&self) -> Option<TaskCard> {
        let index = self.selection(self.focus).selected_index;
        self.cards(self.focus).into_iter().nth(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sync_with(tasks: Vec<Task>) -> SyncState {
        SyncState {
            tasks,
            loading: false,
            error: None,
            live: true,
        }
    }

    fn board(now: DateTime<Utc>) -> Vec<Task> {
        vec![
            Task::with_id("p1", "alice", "fresh", now - TimeDelta::minutes(1)),
            Task::with_id("d1", "bob", "shipped", now - TimeDelta::minutes(2)).with_status(TaskStatus::Done),
            Task::with_id("p2", "carol", "older", now - TimeDelta::minutes(30)),
        ]
    }

    #[test]
    fn test_new_state_is_loading() {
        let state = DashboardState::new();
        assert_eq!(state.screen(), Screen::Loading);
        assert_eq!(state.focus, Column::Pending);
    }

    #[test]
    fn test_screen_selection() {
        let mut state = DashboardState::new();

        state.apply_sync(SyncState {
            error: Some("network unreachable".to_string()),
            loading: false,
            ..SyncState::default()
        });
        assert_eq!(state.screen(), Screen::Error("network unreachable".to_string()));

        // Retrying with nothing on screen shows the spinner again
        state.apply_sync(SyncState {
            error: Some("network unreachable".to_string()),
            loading: true,
            ..SyncState::default()
        });
        assert_eq!(state.screen(), Screen::Loading);

        // Errors with tasks on screen are a banner over the board
        let mut sync = sync_with(board(state.now));
        sync.error = Some("permission denied".to_string());
        state.apply_sync(sync);
        assert_eq!(state.screen(), Screen::Board);

        state.apply_sync(sync_with(Vec::new()));
        assert_eq!(state.screen(), Screen::Board);
    }

    #[test]
    fn test_cards_split_by_status() {
        let mut state = DashboardState::new();
        let now = state.now;
        state.apply_sync(sync_with(board(now)));

        let pending = state.cards(Column::Pending);
        let completed = state.cards(Column::Completed);

        assert_eq!(pending.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["p1", "p2"]);
        assert_eq!(completed.len(), 1);
        assert!(pending.iter().all(|c| c.action == Some(CardAction::MarkDone)));
        assert!(completed.iter().all(|c| c.action.is_none()));
        assert!(pending[0].is_new);
        assert!(!pending[1].is_new);
        assert!(!completed[0].is_new);
        assert_eq!(pending[1].timestamp, "30 minutes ago");
    }

    #[test]
    fn test_selection_follows_task_across_snapshots() {
        let mut state = DashboardState::new();
        let now = state.now;
        state.apply_sync(sync_with(board(now)));
        state.pending_selection.selected_index = 1;

        // A newer pending task lands on top
        let mut tasks = board(now);
        tasks.insert(0, Task::with_id("p0", "dave", "newest", now));
        state.apply_sync(sync_with(tasks));

        assert_eq!(state.pending_selection.selected_index, 2);
        assert_eq!(state.selected_card().map(|c| c.id), Some(TaskId::from("p2")));
    }

    #[test]
    fn test_selection_clamped_when_task_leaves_column() {
        let mut state = DashboardState::new();
        let now = state.now;
        state.apply_sync(sync_with(board(now)));
        state.pending_selection.selected_index = 1;

        let tasks: Vec<Task> = board(now)
            .into_iter()
            .map(|t| if t.id.as_str() == "p2" { t.with_status(TaskStatus::Done) } else { t })
            .collect();
        state.apply_sync(sync_with(tasks));

        assert_eq!(state.pending_selection.selected_index, 0);
        assert_eq!(state.item_count(Column::Completed), 2);
    }

    #[test]
    fn test_tick_ages_cards() {
        let mut state = DashboardState::new();
        let now = state.now;
        state.apply_sync(sync_with(board(now)));
        assert_eq!(state.stats().new, 2);

        state.tick(now + TimeDelta::minutes(10));
        assert_eq!(state.stats().new, 0);
        assert!(!state.cards(Column::Pending)[0].is_new);
    }

    #[test]
    fn test_selection_bounds() {
        let mut selection = SelectionState::default();
        selection.select_prev();
        assert_eq!(selection.selected_index, 0);
        selection.select_next(2);
        selection.select_next(2);
        assert_eq!(selection.selected_index, 1);
        selection.select_last(0);
        assert_eq!(selection.selected_index, 1);
        selection.clamp(0);
        assert_eq!(selection.selected_index, 0);
    }
}
