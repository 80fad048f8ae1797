//! TUI application - keyboard handling
//!
//! The App struct owns the DashboardState and turns key presses into state
//! changes or pending actions for the runner. Rendering lives in views.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{CardAction, DashboardState, InteractionMode, PendingAction};

/// TUI application
#[derive(Debug, Default)]
pub struct App {
    state: DashboardState,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Self {
        Self {
            state: DashboardState::new(),
        }
    }

    /// Get reference to state
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Get mutable reference to state
    pub fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    /// Handle a key event
    ///
    /// Returns true if the application should exit immediately.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        match self.state.interaction_mode {
            InteractionMode::Normal => self.handle_normal_key(key),
            InteractionMode::Help => self.handle_help_key(key),
        }
        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let focus = self.state.focus;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.state.should_quit = true;
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.state.interaction_mode = InteractionMode::Help;
            }
            KeyCode::Char('r') => {
                self.state.pending_action = Some(PendingAction::Refresh);
            }

            // === Column focus ===
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') => {
                self.state.focus = focus.other();
            }

            // === Navigation ===
            KeyCode::Up | KeyCode::Char('k') => {
                self.state.selection_mut(focus).select_prev();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = self.state.item_count(focus);
                self.state.selection_mut(focus).select_next(max);
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.state.selection_mut(focus).select_first();
            }
            KeyCode::Char('G') | KeyCode::End => {
                let max = self.state.item_count(focus);
                self.state.selection_mut(focus).select_last(max);
            }

            // === Card action ===
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(card) = self.state.selected_card()
                    && card.action == Some(CardAction::MarkDone)
                {
                    self.state.pending_action = Some(PendingAction::MarkDone(card.id));
                }
            }
            _ => {}
        }
    }

    /// Any of the closing keys leaves help; everything else is swallowed
    fn handle_help_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Esc | KeyCode::F(1)) {
            self.state.interaction_mode = InteractionMode::Normal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, TaskStatus};
    use crate::sync::SyncState;
    use crate::tui::state::Column;
    use chrono::{TimeDelta, Utc};

    fn app_with_tasks() -> App {
        let now = Utc::now();
        let mut app = App::new();
        app.state_mut().apply_sync(SyncState {
            tasks: vec![
                Task::with_id("p1", "alice", "wire up login", now - TimeDelta::minutes(1)),
                Task::with_id("p2", "bob", "record demo", now - TimeDelta::minutes(20)),
                Task::with_id("d1", "carol", "buy pizza", now - TimeDelta::hours(2)).with_status(TaskStatus::Done),
            ],
            loading: false,
            error: None,
            live: true,
        });
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::from(code))
    }

    #[test]
    fn test_app_new() {
        let app = App::new();
        assert_eq!(app.state().interaction_mode, InteractionMode::Normal);
        assert!(!app.state().should_quit);
    }

    #[test]
    fn test_app_quit_keys() {
        let mut app = App::new();
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));

        let mut app = App::new();
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(app.state().should_quit);

        let mut app = App::new();
        press(&mut app, KeyCode::Esc);
        assert!(app.state().should_quit);
    }

    #[test]
    fn test_app_help_toggle() {
        let mut app = App::new();

        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.state().interaction_mode, InteractionMode::Help);

        // Keys other than the closing ones are ignored while help is open
        press(&mut app, KeyCode::Char('r'));
        assert!(app.state().pending_action.is_none());

        // Esc closes help instead of quitting
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state().interaction_mode, InteractionMode::Normal);
        assert!(!app.state().should_quit);
    }

    #[test]
    fn test_refresh_key() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state().pending_action, Some(PendingAction::Refresh));
    }

    #[test]
    fn test_mark_selected_done() {
        let mut app = app_with_tasks();

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);

        assert_eq!(
            app.state().pending_action,
            Some(PendingAction::MarkDone(TaskId::from("p2")))
        );
    }

    #[test]
    fn test_completed_cards_have_no_action() {
        let mut app = app_with_tasks();

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.state().focus, Column::Completed);
        press(&mut app, KeyCode::Char(' '));

        assert!(app.state().pending_action.is_none());
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut app = app_with_tasks();

        for _ in 0..5 {
            press(&mut app, KeyCode::Down);
        }
        assert_eq!(app.state().pending_selection.selected_index, 1);

        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.state().pending_selection.selected_index, 0);
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.state().pending_selection.selected_index, 1);

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.state().completed_selection.selected_index, 0);

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.state().focus, Column::Pending);
    }

    #[test]
    fn test_enter_on_empty_board_does_nothing() {
        let mut app = App::new();
        press(&mut app, KeyCode::Enter);
        assert!(app.state().pending_action.is_none());
    }
}
