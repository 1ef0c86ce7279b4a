//! Column visibility dialog
//!
//! Lists every field with a checkbox; Space or Enter toggles the highlighted
//! one.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use datagrid::model::FieldDescriptor;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    pub label: String,
    pub hidden: bool,
}

pub struct ColumnDialog {
    pub columns: Vec<ColumnEntry>,
    pub selected_index: usize,
    list_state: ListState,
}

impl Default for ColumnDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnDialog {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            columns: Vec::new(),
            selected_index: 0,
            list_state,
        }
    }

    /// Refresh the entries, keeping the highlighted row where possible
    pub fn set_columns(&mut self, fields: &[FieldDescriptor]) {
        self.columns = fields
            .iter()
            .map(|f| ColumnEntry {
                name: f.name.clone(),
                label: f.display_label().to_string(),
                hidden: f.hidden,
            })
            .collect();
        self.selected_index = self.selected_index.min(self.columns.len().saturating_sub(1));
        self.list_state.select(Some(self.selected_index));
    }

    pub fn selected_column(&self) -> Option<&ColumnEntry> {
        self.columns.get(self.selected_index)
    }

    fn select_next(&mut self) {
        if self.selected_index + 1 < self.columns.len() {
            self.selected_index += 1;
            self.list_state.select(Some(self.selected_index));
        }
    }

    fn select_prev(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
            self.list_state.select(Some(self.selected_index));
        }
    }
}

impl Component for ColumnDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => Some(Action::CloseModal),
            KeyCode::Enter | KeyCode::Char(' ') => self
                .selected_column()
                .map(|column| Action::ToggleColumn(column.name.clone())),
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_prev();
                Some(Action::ModalUp)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                Some(Action::ModalDown)
            }
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let popup_width = 50u16.min(area.width.saturating_sub(4));
        let popup_height = (self.columns.len() as u16 + 8).clamp(10, area.height.saturating_sub(4).max(10));
        let popup_area = centered_popup(area, popup_width, popup_height);
        frame.render_widget(Clear, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(popup_area);

        let hidden = self.columns.iter().filter(|c| c.hidden).count();
        let items: Vec<ListItem> = self
            .columns
            .iter()
            .map(|column| {
                let (check, style) = if column.hidden {
                    ("[ ] ", Style::default().fg(Color::DarkGray))
                } else {
                    ("[x] ", Style::default().fg(Color::White))
                };
                ListItem::new(Line::from(vec![
                    Span::styled(check, Style::default().fg(Color::Green)),
                    Span::styled(column.label.clone(), style),
                    Span::styled(format!("  {}", column.name), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Columns ({} hidden) ", hidden))
                    .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, chunks[0], &mut self.list_state);

        let help = Paragraph::new(Line::from(vec![
            Span::styled(" Space ", Style::default().fg(Color::Yellow)),
            Span::raw("Show/hide  "),
            Span::styled(" j/k ", Style::default().fg(Color::Cyan)),
            Span::raw("Navigate  "),
            Span::styled(" Esc ", Style::default().fg(Color::Yellow)),
            Span::raw("Close"),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[1]);
        Ok(())
    }
}
