//! Selection menu (TUI popup)
//!
//! A small list picker used for the database mode selector and for the
//! command menu shown when the user types "/".

use crate::cli::commands::COMMANDS;
use crate::config::DatabaseMode;
use ratatui::{
    crossterm::event::{self, Event, KeyCode, KeyEventKind},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::io;

/// Menu item
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Value returned when the item is chosen
    pub name: String,
    /// Description shown next to the name
    pub description: String,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Result of running a menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuResult {
    /// User selected the item at this index
    Selected(usize),
    /// User cancelled (ESC)
    Cancelled,
    /// User wants to type their own input
    TextInput,
}

/// What a key press does to the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Up,
    Down,
    Select,
    Cancel,
    Type,
    Ignore,
}

fn action_for(code: KeyCode, allow_typing: bool) -> MenuAction {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => MenuAction::Cancel,
        KeyCode::Enter => MenuAction::Select,
        KeyCode::Down | KeyCode::Char('j') => MenuAction::Down,
        KeyCode::Up | KeyCode::Char('k') => MenuAction::Up,
        KeyCode::Char('/') if allow_typing => MenuAction::Type,
        _ => MenuAction::Ignore,
    }
}

/// Move the selection one step, staying within `len` items
fn step(selected: Option<usize>, len: usize, action: MenuAction) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = selected.unwrap_or(0).min(len - 1);
    let next = match action {
        MenuAction::Down if current + 1 < len => current + 1,
        MenuAction::Up if current > 0 => current - 1,
        _ => current,
    };
    Some(next)
}

/// Items of the "/" command menu
pub fn command_items() -> Vec<MenuItem> {
    COMMANDS
        .iter()
        .map(|cmd| MenuItem::new(cmd.name, cmd.description))
        .collect()
}

/// Items of the database mode selector, in `DatabaseMode::ALL` order
pub fn mode_items() -> Vec<MenuItem> {
    DatabaseMode::ALL
        .iter()
        .map(|mode| {
            let description = match mode {
                DatabaseMode::Local => "Use the bundled student.db (read-only)",
                DatabaseMode::Remote => "Connect to your MySQL database",
            };
            MenuItem::new(mode.label(), description)
        })
        .collect()
}

/// Display the "/" command menu and return the chosen command name
pub fn show_command_menu() -> io::Result<Option<String>> {
    let items = command_items();
    match show_menu(" ⚡ SQL Chat ", &items, 0, true)? {
        MenuResult::Selected(index) => Ok(items.get(index).map(|item| item.name.clone())),
        MenuResult::TextInput => Ok(Some("/".to_string())),
        MenuResult::Cancelled => Ok(None),
    }
}

/// Display the mode selector; `None` when the user cancels
pub fn show_mode_selector(current: DatabaseMode) -> io::Result<Option<DatabaseMode>> {
    let items = mode_items();
    let initial = DatabaseMode::ALL
        .iter()
        .position(|mode| *mode == current)
        .unwrap_or(0);

    match show_menu(" Choose the database you want to chat with ", &items, initial, false)? {
        MenuResult::Selected(index) => Ok(DatabaseMode::ALL.get(index).copied()),
        _ => Ok(None),
    }
}

/// Display a menu and return what the user did
pub fn show_menu(
    title: &str,
    items: &[MenuItem],
    initial: usize,
    allow_typing: bool,
) -> io::Result<MenuResult> {
    let mut state = ListState::default();
    state.select(step(Some(initial), items.len(), MenuAction::Ignore));

    // Setup terminal
    enter_menu_screen(
        crossterm::terminal::enable_raw_mode,
        || crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen),
        crossterm::terminal::disable_raw_mode,
    )?;

    let stdout = io::stdout();
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let result = ratatui::Terminal::new(backend)
        .and_then(|mut terminal| run_menu(&mut terminal, title, items, &mut state, allow_typing));

    // Restore terminal
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;

    result
}

/// Enable raw mode, then switch screens; raw mode is undone if the switch fails
fn enter_menu_screen(
    enable_raw: impl FnOnce() -> io::Result<()>,
    enter_screen: impl FnOnce() -> io::Result<()>,
    disable_raw: impl FnOnce() -> io::Result<()>,
) -> io::Result<()> {
    enable_raw()?;
    if let Err(e) = enter_screen() {
        let _ = disable_raw();
        return Err(e);
    }
    Ok(())
}

fn run_menu(
    terminal: &mut ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    title: &str,
    items: &[MenuItem],
    state: &mut ListState,
    allow_typing: bool,
) -> io::Result<MenuResult> {
    loop {
        terminal.draw(|f| ui(f, title, items, state, allow_typing))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match action_for(key.code, allow_typing) {
            MenuAction::Cancel => return Ok(MenuResult::Cancelled),
            MenuAction::Type => return Ok(MenuResult::TextInput),
            MenuAction::Select => {
                if let Some(selected) = state.selected() {
                    return Ok(MenuResult::Selected(selected));
                }
            }
            action @ (MenuAction::Up | MenuAction::Down) => {
                state.select(step(state.selected(), items.len(), action));
            }
            MenuAction::Ignore => {}
        }
    }
}

fn ui(f: &mut Frame, title: &str, items: &[MenuItem], state: &mut ListState, allow_typing: bool) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Fixed header height
            Constraint::Min(5),    // Scrollable item list
            Constraint::Length(3), // Fixed help text
        ])
        .split(size);

    let header = Paragraph::new(vec![
        Line::from(title.to_string())
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Line::from(""),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .alignment(Alignment::Center);

    f.render_widget(header, chunks[0]);

    let width = items.iter().map(|item| item.name.len()).max().unwrap_or(0);
    let list_items: Vec<ListItem> = items
        .iter()
        .map(|item| {
            ListItem::new(format!(
                "  {:width$}  - {}",
                item.name,
                item.description,
                width = width
            ))
        })
        .collect();

    let list = List::new(list_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::REVERSED)
                .fg(Color::Black)
                .bg(Color::Cyan),
        );

    f.render_stateful_widget(list, chunks[1], state);

    let hint = if allow_typing {
        " ↑/k: Up  ↓/j: Down  Enter: Select  ESC/q: Cancel  /: Type command "
    } else {
        " ↑/k: Up  ↓/j: Down  Enter: Select  ESC/q: Cancel "
    };
    let help = Paragraph::new(vec![Line::from(hint).style(Style::default().fg(Color::Gray))])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(help, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_failed_screen_switch_disables_raw_mode() {
        let calls = RefCell::new(Vec::new());
        let result = enter_menu_screen(
            || {
                calls.borrow_mut().push("enable");
                Ok(())
            },
            || Err(io::Error::new(io::ErrorKind::Other, "no alternate screen")),
            || {
                calls.borrow_mut().push("disable");
                Ok(())
            },
        );

        assert_eq!(result.unwrap_err().to_string(), "no alternate screen");
        assert_eq!(*calls.borrow(), vec!["enable", "disable"]);
    }

    #[test]
    fn test_raw_mode_kept_when_screen_switch_succeeds() {
        let calls = RefCell::new(Vec::new());
        enter_menu_screen(
            || {
                calls.borrow_mut().push("enable");
                Ok(())
            },
            || Ok(()),
            || {
                calls.borrow_mut().push("disable");
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(*calls.borrow(), vec!["enable"]);
    }

    #[test]
    fn test_step_stays_in_bounds() {
        assert_eq!(step(Some(0), 2, MenuAction::Up), Some(0));
        assert_eq!(step(Some(0), 2, MenuAction::Down), Some(1));
        assert_eq!(step(Some(1), 2, MenuAction::Down), Some(1));
        assert_eq!(step(Some(5), 2, MenuAction::Ignore), Some(1));
        assert_eq!(step(None, 0, MenuAction::Down), None);
    }

    #[test]
    fn test_slash_only_types_when_allowed() {
        assert_eq!(action_for(KeyCode::Char('/'), true), MenuAction::Type);
        assert_eq!(action_for(KeyCode::Char('/'), false), MenuAction::Ignore);
        assert_eq!(action_for(KeyCode::Esc, false), MenuAction::Cancel);
    }

    #[test]
    fn test_mode_items_follow_mode_order() {
        let items = mode_items();
        assert_eq!(items.len(), DatabaseMode::ALL.len());
        assert_eq!(items[0].name, DatabaseMode::Local.label());
        assert_eq!(items[1].name, DatabaseMode::Remote.label());
    }

    #[test]
    fn test_command_items_match_commands() {
        let names: Vec<String> = command_items().into_iter().map(|item| item.name).collect();
        assert!(names.contains(&"/clear".to_string()));
        assert_eq!(names.len(), COMMANDS.len());
    }
}
