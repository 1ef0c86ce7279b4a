//! Record form dialog
//!
//! Draws the form the grid describes for a row: read-only in view and delete
//! modes, editable in edit, create and duplicate modes. Typed text is turned
//! back into typed values on submit.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent};
use datagrid::model::value;
use datagrid::model::{FieldType, FormField, FormMode, RowKey};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use serde_json::Value;

const ARRAY_INPUT_SEPARATOR: &str = ", ";

pub struct RecordDialog {
    pub mode: FormMode,
    /// Row the form was opened for; `None` when creating
    pub key: Option<RowKey>,
    pub fields: Vec<FormField>,
    /// Text being edited, one entry per field
    pub inputs: Vec<String>,
    pub selected_index: usize,
    pub error: Option<String>,
}

impl Default for RecordDialog {
    fn default() -> Self {
        Self {
            mode: FormMode::View,
            key: None,
            fields: Vec::new(),
            inputs: Vec::new(),
            selected_index: 0,
            error: None,
        }
    }
}

impl RecordDialog {
    pub fn open(&mut self, mode: FormMode, key: Option<RowKey>, fields: Vec<FormField>) {
        self.inputs = fields
            .iter()
            .map(|f| value::text_with_separator(Some(&f.value), ARRAY_INPUT_SEPARATOR))
            .collect();
        self.mode = mode;
        self.key = key;
        self.fields = fields;
        self.selected_index = 0;
        self.error = None;
    }

    /// The form with typed values, or the first input that does not parse
    pub fn submitted(&self) -> Result<Vec<FormField>> {
        let mut form = self.fields.clone();
        for (field, input) in form.iter_mut().zip(&self.inputs) {
            if field.readonly {
                continue;
            }
            field.value = parse_input(field, input)?;
        }
        Ok(form)
    }

    fn editable(&self) -> bool {
        self.mode.is_editable()
            && self
                .fields
                .get(self.selected_index)
                .is_some_and(|f| !f.readonly)
    }

    fn move_by(&mut self, down: bool) {
        if down && self.selected_index + 1 < self.fields.len() {
            self.selected_index += 1;
        } else if !down {
            self.selected_index = self.selected_index.saturating_sub(1);
        }
    }
}

/// Typed value for the text entered into `field`
pub fn parse_input(field: &FormField, input: &str) -> Result<Value> {
    let input = input.trim();
    if input.is_empty() {
        if field.required {
            bail!("{} is required", field.label);
        }
        return Ok(Value::Null);
    }

    let parsed = match field.field_type {
        FieldType::Number => {
            if let Ok(int) = input.parse::<i64>() {
                Value::from(int)
            } else {
                match input.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    Some(number) => Value::Number(number),
                    None => bail!("{} must be a number", field.label),
                }
            }
        }
        FieldType::Boolean => match input.to_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => bail!("{} must be true or false", field.label),
        },
        FieldType::StringArray => Value::Array(
            input
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        FieldType::Enumeration if !field.options.is_empty() => {
            match field.options.iter().find(|o| o.eq_ignore_ascii_case(input)) {
                Some(option) => Value::String(option.clone()),
                None => bail!("{} must be one of: {}", field.label, field.options.join(", ")),
            }
        }
        _ => Value::String(input.to_string()),
    };
    Ok(parsed)
}

impl Component for RecordDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match self.mode {
            FormMode::View => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => Some(Action::CloseModal),
                KeyCode::Char('e') => Some(Action::OpenRecord(FormMode::Edit)),
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_by(true);
                    Some(Action::ModalDown)
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_by(false);
                    Some(Action::ModalUp)
                }
                _ => None,
            },
            FormMode::Delete => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmModal),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::CloseModal),
                _ => None,
            },
            FormMode::Edit | FormMode::Create | FormMode::Duplicate => match key.code {
                KeyCode::Esc => Some(Action::CloseModal),
                KeyCode::Enter => Some(Action::ConfirmModal),
                KeyCode::Down | KeyCode::Tab => {
                    self.move_by(true);
                    Some(Action::ModalDown)
                }
                KeyCode::Up | KeyCode::BackTab => {
                    self.move_by(false);
                    Some(Action::ModalUp)
                }
                KeyCode::Backspace if self.editable() => {
                    if let Some(input) = self.inputs.get_mut(self.selected_index) {
                        input.pop();
                    }
                    None
                }
                KeyCode::Char(c) if self.editable() => {
                    if let Some(input) = self.inputs.get_mut(self.selected_index) {
                        input.push(c);
                    }
                    None
                }
                _ => None,
            },
        };
        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let height = (self.fields.len() as u16 + 8).min(area.height.saturating_sub(2));
        let popup_area = centered_popup(area, 70u16.min(area.width.saturating_sub(4)), height);
        frame.render_widget(Clear, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(popup_area);

        let label_width = self
            .fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0)
            .min(24);

        let mut lines: Vec<Line> = Vec::new();
        if self.mode == FormMode::Delete {
            lines.push(Line::from(Span::styled(
                "Delete this record?",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
        }

        for (i, (field, input)) in self.fields.iter().zip(&self.inputs).enumerate() {
            let marker = if field.required { "*" } else { " " };
            let shown = if self.mode.is_editable() {
                let cursor = if i == self.selected_index && !field.readonly { "_" } else { "" };
                format!("{}{}", input, cursor)
            } else {
                field.display.clone()
            };
            let value_style = if i == self.selected_index {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else if field.readonly && self.mode.is_editable() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{}{:width$} ", marker, field.label, width = label_width),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(shown, value_style),
            ]));
        }

        if let Some(error) = &self.error {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        }

        let title_color = if self.mode == FormMode::Delete { Color::Red } else { Color::Magenta };
        let body = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} Record ", self.mode.title()))
                .title_style(Style::default().fg(title_color).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(body, chunks[0]);

        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
        let help = match self.mode {
            FormMode::View => vec![key(" e "), Span::raw("Edit  "), key(" Esc "), Span::raw("Close")],
            FormMode::Delete => vec![key(" y "), Span::raw("Delete  "), key(" n/Esc "), Span::raw("Cancel")],
            _ => vec![
                key(" Enter "),
                Span::raw("Save  "),
                key(" Tab "),
                Span::raw("Next field  "),
                key(" Esc "),
                Span::raw("Cancel"),
            ],
        };
        let help = Paragraph::new(Line::from(help))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[1]);
        Ok(())
    }
}
