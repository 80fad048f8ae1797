//! TUI views and rendering

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use super::state::{Column, DashboardState, InteractionMode, Screen, TaskCard};
use crate::domain::TaskStatus;

const ACCENT: Color = Color::Cyan;
const WARNING: Color = Color::Yellow;
const SUCCESS: Color = Color::Green;

/// Main render function
pub fn render(state: &DashboardState, frame: &mut Frame) {
    let area = frame.area();
    match state.screen() {
        Screen::Loading => render_loading(frame, area),
        Screen::Error(message) => render_error(&message, frame, area),
        Screen::Board => render_board(state, frame, area),
    }

    if state.interaction_mode == InteractionMode::Help {
        render_help_overlay(frame, area);
    }
}

fn render_board(state: &DashboardState, frame: &mut Frame, area: Rect) {
    let banner = if state.sync.error.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Header
            Constraint::Length(3),      // Stats
            Constraint::Length(banner), // Error banner
            Constraint::Min(0),         // Columns
            Constraint::Length(3),      // Footer
        ])
        .split(area);

    render_header(state, frame, chunks[0]);
    render_stats(state, frame, chunks[1]);
    if let Some(error) = &state.sync.error {
        let line = Line::from(Span::styled(
            format!(" Error: {}  (r to retry)", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(line), chunks[2]);
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    render_column(state, Column::Pending, frame, columns[0]);
    render_column(state, Column::Completed, frame, columns[1]);

    render_footer(state, frame, chunks[4]);
}

/// Render the header bar
fn render_header(state: &DashboardState, frame: &mut Frame, area: Rect) {
    let live = if state.sync.live {
        Span::styled("● live", Style::default().fg(SUCCESS))
    } else {
        Span::styled("○ offline", Style::default().fg(Color::DarkGray))
    };

    let mut spans = vec![
        Span::styled("HackBuddy Dashboard ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled("Real-time task management from Discord", Style::default().fg(Color::Gray)),
        Span::raw(" │ "),
        live,
    ];
    if state.sync.loading {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("refreshing…", Style::default().fg(WARNING)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

/// Render the four stat cards
fn render_stats(state: &DashboardState, frame: &mut Frame, area: Rect) {
    let stats = state.stats();
    let cards = [
        ("Total Tasks", stats.total, ACCENT),
        ("Pending", stats.pending, WARNING),
        ("Completed", stats.completed, SUCCESS),
        ("New Tasks", stats.new, ACCENT),
    ];

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for ((title, value, color), chunk) in cards.into_iter().zip(chunks.iter()) {
        let card = Paragraph::new(Line::from(Span::styled(
            value.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
        frame.render_widget(card, *chunk);
    }
}

fn card_item(card: &TaskCard) -> ListItem<'static> {
    let (badge, badge_color) = match card.status {
        TaskStatus::Pending => ("○ Pending", ACCENT),
        TaskStatus::Done => ("✓ Completed", SUCCESS),
    };

    let mut meta = vec![Span::styled(
        format!("  {}", card.timestamp),
        Style::default().fg(Color::DarkGray),
    )];
    if card.is_new {
        meta.push(Span::raw(" "));
        meta.push(Span::styled(
            "NEW",
            Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD),
        ));
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled(card.user.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(badge, Style::default().fg(badge_color)),
        ]),
        Line::from(meta),
        Line::from(format!("  {}", card.task)),
    ];
    if let Some(action) = card.action {
        lines.push(Line::from(Span::styled(
            format!("  [Enter] {}", action.label()),
            Style::default().fg(SUCCESS),
        )));
    }
    lines.push(Line::from(""));

    let style = if card.is_new {
        Style::default().fg(Color::White)
    } else {
        Style::default()
    };
    ListItem::new(lines).style(style)
}

/// Render one task column
fn render_column(state: &DashboardState, column: Column, frame: &mut Frame, area: Rect) {
    let cards = state.cards(column);
    let focused = state.focus == column;
    let color = match column {
        Column::Pending => WARNING,
        Column::Completed => SUCCESS,
    };
    let border = if focused {
        Style::default().fg(color)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(format!(" {} ({}) ", column.title(), cards.len()));

    if cards.is_empty() {
        let message = match column {
            Column::Pending => "All tasks completed! 🎉",
            Column::Completed => "No completed tasks yet",
        };
        let empty = Paragraph::new(Line::from(Span::styled(message, Style::default().fg(Color::Gray))))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = cards.iter().map(card_item).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▌");

    let mut list_state = ListState::default();
    if focused {
        list_state.select(Some(state.selection(column).selected_index));
    }
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let text = Paragraph::new(Line::from(Span::styled(
        "Loading tasks...",
        Style::default().fg(Color::Gray),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(text, centered_rect(50, 20, area));
}

fn render_error(message: &str, frame: &mut Frame, area: Rect) {
    let text = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("Error: {}", message),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("r", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::raw(" Try again   "),
            Span::styled("q", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::raw(" Quit"),
        ]),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(text, centered_rect(70, 30, area));
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![Span::styled(k, Style::default().fg(ACCENT)), Span::raw(what)])
    };
    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        key("q, Esc        ", "Quit"),
        key("Ctrl+c        ", "Force quit"),
        key("?, F1         ", "Toggle help"),
        key("r             ", "Refresh"),
        Line::from(""),
        key("Tab, ←/→, h/l ", "Switch column"),
        key("↑/↓, j/k      ", "Select task"),
        key("g/G           ", "First / last task"),
        key("Enter, Space  ", "Mark selected pending task as done"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(help, popup_area);
}

/// Render the footer bar
fn render_footer(state: &DashboardState, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
    let mut spans = vec![
        Span::styled(" q", key_style),
        Span::raw(" Quit "),
        Span::styled(" ?", key_style),
        Span::raw(" Help "),
        Span::styled(" r", key_style),
        Span::raw(" Refresh "),
        Span::styled(" Tab", key_style),
        Span::raw(" Column "),
        Span::styled(" ↑↓", key_style),
        Span::raw(" Select "),
    ];
    if state.focus == Column::Pending {
        spans.push(Span::styled(" Enter", key_style));
        spans.push(Span::raw(" Mark done "));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

/// Helper to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
