//! Filter builder dialog
//!
//! Three steps: pick a filterable field, pick one of the comparators its
//! type allows, then type the value. Enter on the last step emits
//! `Action::AddFilter`; the grid validates the value and the App reports
//! any rejection.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use datagrid::model::{Comparator, FieldDescriptor, FieldType};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStep {
    Field,
    Comparator,
    Value,
}

#[derive(Debug, Clone)]
struct FilterTarget {
    name: String,
    label: String,
    field_type: FieldType,
    comparators: &'static [Comparator],
    options: Vec<String>,
}

pub struct FilterDialog {
    pub step: FilterStep,
    targets: Vec<FilterTarget>,
    field_index: usize,
    comparator_index: usize,
    pub input: String,
    list_state: ListState,
}

impl Default for FilterDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterDialog {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            step: FilterStep::Field,
            targets: Vec::new(),
            field_index: 0,
            comparator_index: 0,
            input: String::new(),
            list_state,
        }
    }

    /// Start over with the grid's filterable fields
    pub fn reset(&mut self, fields: &[FieldDescriptor]) {
        self.targets = fields
            .iter()
            .filter(|f| f.filterable)
            .map(|f| FilterTarget {
                name: f.name.clone(),
                label: f.display_label().to_string(),
                field_type: f.field_type,
                comparators: f.comparators(),
                options: f.options.clone(),
            })
            .collect();
        self.step = FilterStep::Field;
        self.field_index = 0;
        self.comparator_index = 0;
        self.input.clear();
        self.list_state.select(Some(0));
    }

    fn target(&self) -> Option<&FilterTarget> {
        self.targets.get(self.field_index)
    }

    fn comparator(&self) -> Option<Comparator> {
        self.target()
            .and_then(|t| t.comparators.get(self.comparator_index))
            .copied()
    }

    fn list_len(&self) -> usize {
        match self.step {
            FilterStep::Field => self.targets.len(),
            FilterStep::Comparator => self.target().map_or(0, |t| t.comparators.len()),
            FilterStep::Value => 0,
        }
    }

    fn index_mut(&mut self) -> &mut usize {
        match self.step {
            FilterStep::Comparator => &mut self.comparator_index,
            _ => &mut self.field_index,
        }
    }

    fn move_by(&mut self, down: bool) {
        let len = self.list_len();
        let index = self.index_mut();
        if down && *index + 1 < len {
            *index += 1;
        } else if !down && *index > 0 {
            *index -= 1;
        }
        let index = *index;
        self.list_state.select(Some(index));
    }

    fn advance(&mut self) -> Option<Action> {
        match self.step {
            FilterStep::Field => {
                self.target()?;
                self.step = FilterStep::Comparator;
                self.comparator_index = 0;
                self.list_state.select(Some(0));
                None
            }
            FilterStep::Comparator => {
                self.comparator()?;
                self.step = FilterStep::Value;
                None
            }
            FilterStep::Value => {
                let target = self.target()?;
                Some(Action::AddFilter {
                    field: target.name.clone(),
                    comparator: self.comparator()?,
                    input: self.input.clone(),
                })
            }
        }
    }

    /// Step back; closing the dialog from the first step
    fn back(&mut self) -> Option<Action> {
        match self.step {
            FilterStep::Field => Some(Action::CloseModal),
            FilterStep::Comparator => {
                self.step = FilterStep::Field;
                self.list_state.select(Some(self.field_index));
                None
            }
            FilterStep::Value => {
                self.step = FilterStep::Comparator;
                self.list_state.select(Some(self.comparator_index));
                None
            }
        }
    }
}

impl Component for FilterDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match (self.step, key.code) {
            (_, KeyCode::Esc) => self.back(),
            (_, KeyCode::Enter) => self.advance(),
            (FilterStep::Value, KeyCode::Backspace) => {
                self.input.pop();
                None
            }
            (FilterStep::Value, KeyCode::Char(c)) => {
                self.input.push(c);
                None
            }
            (_, KeyCode::Up | KeyCode::Char('k')) => {
                self.move_by(false);
                Some(Action::ModalUp)
            }
            (_, KeyCode::Down | KeyCode::Char('j')) => {
                self.move_by(true);
                Some(Action::ModalDown)
            }
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let popup_width = 56u16.min(area.width.saturating_sub(4));
        let popup_height = 18u16.min(area.height.saturating_sub(2));
        let popup_area = centered_popup(area, popup_width, popup_height);
        frame.render_widget(Clear, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(popup_area);

        // Header: what has been chosen so far
        let mut summary = Vec::new();
        if let Some(target) = self.target().filter(|_| self.step != FilterStep::Field) {
            summary.push(Span::styled(target.label.clone(), Style::default().fg(Color::Cyan)));
            if let Some(comparator) = self.comparator().filter(|_| self.step == FilterStep::Value) {
                summary.push(Span::raw(format!(" {} ", comparator.label())));
            }
        } else {
            summary.push(Span::styled("Choose a column", Style::default().fg(Color::DarkGray)));
        }
        let header = Paragraph::new(Line::from(summary)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Add Filter ")
                .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(header, chunks[0]);

        let body_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let highlight = Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);

        match self.step {
            FilterStep::Field if self.targets.is_empty() => {
                let empty = Paragraph::new(Line::from(Span::styled(
                    "No filterable columns",
                    Style::default().fg(Color::Yellow),
                )))
                .alignment(Alignment::Center)
                .block(body_block);
                frame.render_widget(empty, chunks[1]);
            }
            FilterStep::Field => {
                let items: Vec<ListItem> = self
                    .targets
                    .iter()
                    .map(|t| {
                        ListItem::new(Line::from(vec![
                            Span::raw(t.label.clone()),
                            Span::styled(format!("  {}", t.field_type), Style::default().fg(Color::DarkGray)),
                        ]))
                    })
                    .collect();
                let list = List::new(items)
                    .block(body_block)
                    .highlight_style(highlight)
                    .highlight_symbol("▶ ");
                frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
            }
            FilterStep::Comparator => {
                let items: Vec<ListItem> = self
                    .target()
                    .map(|t| t.comparators)
                    .unwrap_or(&[])
                    .iter()
                    .map(|c| ListItem::new(c.label()))
                    .collect();
                let list = List::new(items)
                    .block(body_block)
                    .highlight_style(highlight)
                    .highlight_symbol("▶ ");
                frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
            }
            FilterStep::Value => {
                let mut lines = vec![Line::from(vec![
                    Span::styled("> ", Style::default().fg(Color::Yellow)),
                    Span::raw(format!("{}_", self.input)),
                ])];
                if let Some(target) = self.target() {
                    let hint = match target.field_type {
                        FieldType::Number => "whole number".to_string(),
                        FieldType::Date => "date, e.g. 2024-03-01".to_string(),
                        FieldType::Time => "time, e.g. 13:30".to_string(),
                        FieldType::Boolean => "true or false".to_string(),
                        FieldType::Enumeration if !target.options.is_empty() => target.options.join(", "),
                        _ => "text".to_string(),
                    };
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
                }
                frame.render_widget(Paragraph::new(lines).block(body_block), chunks[1]);
            }
        }

        let help = Paragraph::new(Line::from(vec![
            Span::styled(" Enter ", Style::default().fg(Color::Yellow)),
            Span::raw("Next  "),
            Span::styled(" Esc ", Style::default().fg(Color::Yellow)),
            Span::raw("Back"),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[2]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(dialog: &mut FilterDialog, code: KeyCode) -> Option<Action> {
        dialog.handle_key_event(KeyEvent::from(code)).unwrap()
    }

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("notes", FieldType::String).not_filterable(),
            FieldDescriptor::new("name", FieldType::String),
            FieldDescriptor::new("age", FieldType::Number),
        ]
    }

    #[test]
    fn test_builds_filter_in_three_steps() {
        let mut dialog = FilterDialog::new();
        dialog.reset(&fields());

        press(&mut dialog, KeyCode::Down);
        assert_eq!(press(&mut dialog, KeyCode::Enter), None);
        assert_eq!(dialog.step, FilterStep::Comparator);

        // Number comparators: equals, does not equal, greater than, less than
        press(&mut dialog, KeyCode::Down);
        press(&mut dialog, KeyCode::Down);
        press(&mut dialog, KeyCode::Enter);
        assert_eq!(dialog.step, FilterStep::Value);

        for c in "30".chars() {
            press(&mut dialog, KeyCode::Char(c));
        }
        assert_eq!(
            press(&mut dialog, KeyCode::Enter),
            Some(Action::AddFilter {
                field: "age".to_string(),
                comparator: Comparator::IsGreaterThan,
                input: "30".to_string(),
            })
        );
    }

    #[test]
    fn test_escape_steps_back_then_closes() {
        let mut dialog = FilterDialog::new();
        dialog.reset(&fields());
        press(&mut dialog, KeyCode::Enter);
        press(&mut dialog, KeyCode::Enter);
        // 'j' is text on the value step
        press(&mut dialog, KeyCode::Char('j'));
        assert_eq!(dialog.input, "j");

        assert_eq!(press(&mut dialog, KeyCode::Esc), None);
        assert_eq!(dialog.step, FilterStep::Comparator);
        assert_eq!(press(&mut dialog, KeyCode::Esc), None);
        assert_eq!(press(&mut dialog, KeyCode::Esc), Some(Action::CloseModal));
    }

    #[test]
    fn test_no_filterable_fields() {
        let mut dialog = FilterDialog::new();
        dialog.reset(&fields()[..1]);
        assert_eq!(press(&mut dialog, KeyCode::Enter), None);
        assert_eq!(dialog.step, FilterStep::Field);
    }
}
