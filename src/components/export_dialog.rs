//! CSV export dialog
//!
//! Edits a copy of the grid's export options, then hands them back with
//! `Action::ExportCsv`. The App runs the export and writes the file.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use datagrid::model::{ExportOptions, HeaderMode, QuoteEscape};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportRow {
    Header,
    ObeyView,
    Escape,
    Filename,
    Export,
}

const ROWS: [ExportRow; 5] = [
    ExportRow::Header,
    ExportRow::ObeyView,
    ExportRow::Escape,
    ExportRow::Filename,
    ExportRow::Export,
];

pub struct ExportDialog {
    pub options: ExportOptions,
    /// Filename being typed; empty means the grid's default
    pub filename: String,
    pub selected_index: usize,
}

impl Default for ExportDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportDialog {
    pub fn new() -> Self {
        Self {
            options: ExportOptions::default(),
            filename: String::new(),
            selected_index: 0,
        }
    }

    pub fn reset(&mut self, options: &ExportOptions) {
        self.options = options.clone();
        self.filename = options.filename.clone().unwrap_or_default();
        self.selected_index = 0;
    }

    pub fn selected_row(&self) -> ExportRow {
        ROWS[self.selected_index.min(ROWS.len() - 1)]
    }

    /// Options as they stand, with the typed filename applied
    pub fn current_options(&self) -> ExportOptions {
        let filename = self.filename.trim();
        ExportOptions {
            filename: (!filename.is_empty()).then(|| filename.to_string()),
            ..self.options.clone()
        }
    }

    fn change(&mut self) {
        match self.selected_row() {
            ExportRow::Header => {
                let modes = HeaderMode::all();
                let current = modes.iter().position(|m| *m == self.options.header).unwrap_or(0);
                self.options.header = modes[(current + 1) % modes.len()];
            }
            ExportRow::ObeyView => self.options.obey_view = !self.options.obey_view,
            ExportRow::Escape => {
                self.options.escape = match self.options.escape {
                    QuoteEscape::Backslash => QuoteEscape::Doubled,
                    QuoteEscape::Doubled => QuoteEscape::Backslash,
                }
            }
            ExportRow::Filename | ExportRow::Export => {}
        }
    }
}

impl Component for ExportDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let on_filename = self.selected_row() == ExportRow::Filename;
        let action = match key.code {
            KeyCode::Esc => Some(Action::CloseModal),
            KeyCode::Up => {
                self.selected_index = self.selected_index.saturating_sub(1);
                Some(Action::ModalUp)
            }
            KeyCode::Down | KeyCode::Tab => {
                self.selected_index = (self.selected_index + 1).min(ROWS.len() - 1);
                Some(Action::ModalDown)
            }
            KeyCode::Enter if matches!(self.selected_row(), ExportRow::Filename | ExportRow::Export) => {
                Some(Action::ExportCsv(self.current_options()))
            }
            KeyCode::Backspace if on_filename => {
                self.filename.pop();
                None
            }
            KeyCode::Char(c) if on_filename => {
                self.filename.push(c);
                None
            }
            KeyCode::Char('k') => {
                self.selected_index = self.selected_index.saturating_sub(1);
                Some(Action::ModalUp)
            }
            KeyCode::Char('j') => {
                self.selected_index = (self.selected_index + 1).min(ROWS.len() - 1);
                Some(Action::ModalDown)
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.change();
                None
            }
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let popup_area = centered_popup(area, 56u16.min(area.width.saturating_sub(4)), 13);
        frame.render_widget(Clear, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(7), Constraint::Length(3)])
            .split(popup_area);

        let filename = if self.filename.is_empty() {
            "(default)".to_string()
        } else {
            self.filename.clone()
        };
        let values = [
            ("Header", self.options.header.label().to_string()),
            (
                "Rows",
                if self.options.obey_view {
                    "Current view".to_string()
                } else {
                    "All rows and columns".to_string()
                },
            ),
            (
                "Quotes",
                match self.options.escape {
                    QuoteEscape::Backslash => "Backslash (\\\")".to_string(),
                    QuoteEscape::Doubled => "Doubled (\"\")".to_string(),
                },
            ),
            ("File", filename),
        ];

        let mut lines: Vec<Line> = values
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| {
                let selected = i == self.selected_index;
                let style = if selected {
                    Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(format!(" {:8}", name), Style::default().fg(Color::Cyan)),
                    Span::styled(value, style),
                ])
            })
            .collect();

        let export_style = if self.selected_row() == ExportRow::Export {
            Style::default().bg(Color::Green).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(" [ Export ] ", export_style)).alignment(Alignment::Center));

        let body = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Export CSV ")
                .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(body, chunks[0]);

        let help = Paragraph::new(Line::from(vec![
            Span::styled(" Space ", Style::default().fg(Color::Yellow)),
            Span::raw("Change  "),
            Span::styled(" ↑/↓ ", Style::default().fg(Color::Cyan)),
            Span::raw("Navigate  "),
            Span::styled(" Esc ", Style::default().fg(Color::Yellow)),
            Span::raw("Cancel"),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[1]);
        Ok(())
    }
}
