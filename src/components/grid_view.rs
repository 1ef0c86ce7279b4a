//! Grid view - the main screen
//!
//! Owns the cursor, focused column, scroll position and search input. The
//! rows themselves come from the `GridController` at draw time, so the view
//! never holds a copy of grid data.

use crate::action::Action;
use crate::component::Component;
use crate::components::calculate_main_layout;
use crate::components::layout::fit_to_width;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use datagrid::model::{FieldDescriptor, FormMode, GridController, GridLifecycle, ViewRow};
use ratatui::{
    layout::{Alignment, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const MAX_COLUMN_WIDTH: usize = 40;
const MIN_COLUMN_WIDTH: usize = 3;
const COLUMN_SEPARATOR: &str = " │ ";
const PAGE_STEP: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// Grid View
// ═══════════════════════════════════════════════════════════════════════════════

pub struct GridView {
    /// Cursor position among the visible rows
    pub cursor: usize,
    /// Focused column among the visible fields
    pub column: usize,
    /// First visible row drawn at the top of the table
    pub scroll: usize,
    pub search_mode: bool,
    pub search_input: String,
    /// Visible position under the mouse pointer
    pub hovered: Option<usize>,
    /// Table body from the last draw, for mouse hit testing
    body_area: Rect,
}

impl Default for GridView {
    fn default() -> Self {
        Self::new()
    }
}

impl GridView {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            column: 0,
            scroll: 0,
            search_mode: false,
            search_input: String::new(),
            hovered: None,
            body_area: Rect::default(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn next(&mut self, len: usize) {
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    pub fn previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn first(&mut self) {
        self.cursor = 0;
    }

    pub fn last(&mut self, len: usize) {
        self.cursor = len.saturating_sub(1);
    }

    pub fn page_down(&mut self, len: usize) {
        self.cursor = (self.cursor + PAGE_STEP).min(len.saturating_sub(1));
    }

    pub fn page_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(PAGE_STEP);
    }

    pub fn next_column(&mut self, count: usize) {
        if self.column + 1 < count {
            self.column += 1;
        }
    }

    pub fn previous_column(&mut self) {
        self.column = self.column.saturating_sub(1);
    }

    /// Keep cursor and column inside the current view
    pub fn clamp(&mut self, len: usize, columns: usize) {
        self.cursor = self.cursor.min(len.saturating_sub(1));
        self.column = self.column.min(columns.saturating_sub(1));
        if self.hovered.is_some_and(|i| i >= len) {
            self.hovered = None;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────

    pub fn enter_search_mode(&mut self) {
        self.search_mode = true;
    }

    pub fn exit_search_mode(&mut self) {
        self.search_mode = false;
    }

    pub fn search_input(&mut self, c: char) {
        self.search_input.push(c);
        self.cursor = 0;
    }

    pub fn search_backspace(&mut self) {
        self.search_input.pop();
        self.cursor = 0;
    }

    pub fn clear_search(&mut self) {
        self.search_input.clear();
        self.search_mode = false;
        self.cursor = 0;
    }

    /// Visible position of the row drawn at terminal cell (`x`, `y`)
    pub fn row_at(&self, x: u16, y: u16) -> Option<usize> {
        let body = self.body_area;
        let inside = x >= body.x && x < body.x + body.width && y >= body.y && y < body.y + body.height;
        inside.then(|| self.scroll + (y - body.y) as usize)
    }

    /// Scroll so the cursor stays within `height` rows
    fn follow_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor < self.scroll {
            self.scroll = self.cursor;
        } else if self.cursor >= self.scroll + height {
            self.scroll = self.cursor + 1 - height;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Component Implementation
// ═══════════════════════════════════════════════════════════════════════════════

impl Component for GridView {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::OpenQuitDialog),
            KeyCode::Char('c') if ctrl => Some(Action::ForceQuit),
            KeyCode::Char('?') => Some(Action::OpenHelp),

            // Navigation
            KeyCode::Char('j') | KeyCode::Down => Some(Action::NextRow),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::PrevRow),
            KeyCode::Char('h') | KeyCode::Left => Some(Action::PrevColumn),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::NextColumn),
            KeyCode::Char('g') | KeyCode::Home => Some(Action::FirstRow),
            KeyCode::Char('G') | KeyCode::End => Some(Action::LastRow),
            KeyCode::Char('d') if ctrl => Some(Action::PageDown),
            KeyCode::Char('u') if ctrl => Some(Action::PageUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::PageUp => Some(Action::PageUp),

            // Selection
            KeyCode::Char(' ') if shift => Some(Action::ExtendSelection),
            KeyCode::Char(' ') => Some(Action::SelectRow),
            KeyCode::Char('v') => Some(Action::ExtendSelection),
            KeyCode::Char('a') if ctrl => Some(Action::ToggleSelectAll),
            KeyCode::Esc => Some(Action::ClearSelection),
            KeyCode::Enter => Some(Action::ActivateRow),

            // View
            KeyCode::Char('s') => Some(Action::ToggleSort),
            KeyCode::Char('/') => Some(Action::EnterSearchMode),
            KeyCode::Char('c') => Some(Action::OpenColumns),
            KeyCode::Char('f') => Some(Action::OpenFilter),
            KeyCode::Char('x') => Some(Action::RemoveLastFilter),
            KeyCode::Char('F') => Some(Action::ClearFilters),

            // Records
            KeyCode::Char('e') => Some(Action::OpenRecord(FormMode::Edit)),
            KeyCode::Char('n') => Some(Action::OpenRecord(FormMode::Create)),
            KeyCode::Char('y') => Some(Action::OpenRecord(FormMode::Duplicate)),
            KeyCode::Char('D') => Some(Action::OpenRecord(FormMode::Delete)),

            // Data
            KeyCode::Char('E') => Some(Action::OpenExport),
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::Char('R') => Some(Action::ResetView),
            _ => None,
        };
        Ok(action)
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        let action = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self
                .row_at(mouse.column, mouse.row)
                .map(|index| Action::ClickRow {
                    index,
                    shift: mouse.modifiers.contains(KeyModifiers::SHIFT),
                }),
            MouseEventKind::ScrollDown => Some(Action::NextRow),
            MouseEventKind::ScrollUp => Some(Action::PrevRow),
            MouseEventKind::Moved => {
                let index = self.row_at(mouse.column, mouse.row);
                match index {
                    Some(index) if self.hovered != Some(index) => Some(Action::HoverRow(index)),
                    _ => None,
                }
            }
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, _frame: &mut Frame, _area: Rect) -> Result<()> {
        // Drawn by draw_grid_screen, which has the grid to read from
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════════════════════

/// What the grid screen needs besides the view state
pub struct GridRenderContext<'a> {
    pub grid: &'a GridController,
    pub loading: bool,
    pub error: Option<&'a str>,
    pub status_message: Option<&'a str>,
}

pub fn draw_grid_screen(frame: &mut Frame, area: Rect, view: &mut GridView, ctx: &GridRenderContext) -> Result<()> {
    let filter_tags = ctx.grid.filter_tags();
    let has_search = view.search_mode || !view.search_input.is_empty();
    let notices = notice_text(ctx.grid);
    let has_status = ctx.error.is_some() || ctx.status_message.is_some() || !notices.is_empty();

    let layout = calculate_main_layout(area, !filter_tags.is_empty(), has_search, has_status);

    render_header(frame, layout.header, ctx);
    if let Some(strip) = layout.filters {
        render_filter_strip(frame, strip, &filter_tags);
    }
    if let Some(bar) = layout.search {
        render_search_bar(frame, bar, view);
    }
    render_table(frame, layout.table, view, ctx);
    if let Some(status) = layout.status {
        render_status_bar(frame, status, ctx, &notices);
    }
    render_help_bar(frame, layout.help, view);
    Ok(())
}

fn notice_text(grid: &GridController) -> String {
    grid.notices()
        .iter()
        .map(|notice| notice.message())
        .collect::<Vec<_>>()
        .join(" · ")
}

fn render_header(frame: &mut Frame, area: Rect, ctx: &GridRenderContext) {
    let grid = ctx.grid;
    let mut spans = vec![
        Span::styled(
            format!("{}", grid.visible_len()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" of {} rows", grid.len())),
    ];

    let selected = grid.selection().selected().len();
    if selected > 0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} selected", selected),
            Style::default().fg(Color::Green),
        ));
    }

    if let Some(sort) = grid.sort_state() {
        let label = grid
            .field(&sort.field)
            .map(|f| f.display_label().to_string())
            .unwrap_or_else(|| sort.field.clone());
        spans.push(Span::raw("  sorted by "));
        spans.push(Span::styled(
            format!("{} {}", label, sort.direction.arrow()),
            Style::default().fg(Color::Yellow),
        ));
    }

    if ctx.loading || grid.lifecycle() == GridLifecycle::Loading {
        spans.push(Span::styled("  Loading…", Style::default().fg(Color::Magenta)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", grid.id()))
            .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
    );
    frame.render_widget(header, area);
}

fn render_filter_strip(frame: &mut Frame, area: Rect, tags: &[String]) {
    let mut spans = vec![Span::styled(" Filters: ", Style::default().fg(Color::DarkGray))];
    for tag in tags {
        spans.push(Span::styled(
            format!(" {} ", tag),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        ));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_search_bar(frame: &mut Frame, area: Rect, view: &GridView) {
    let cursor = if view.search_mode { "_" } else { "" };
    let border = if view.search_mode { Color::Yellow } else { Color::DarkGray };
    let bar = Paragraph::new(Line::from(vec![
        Span::styled("/", Style::default().fg(Color::Yellow)),
        Span::raw(format!("{}{}", view.search_input, cursor)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Search ")
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(bar, area);
}

/// Display width of each column: the widest of its label and cells, capped
pub fn column_widths(fields: &[&FieldDescriptor], rows: &[ViewRow]) -> Vec<usize> {
    fields
        .iter()
        .map(|field| {
            // Room for the sort arrow
            let label = field.display_label().width() + 2;
            let widest = rows
                .iter()
                .map(|view| field.render_cell(view.row).width())
                .max()
                .unwrap_or(0);
            label.max(widest).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// First column to draw so that `focused` fits into `available` columns
pub fn first_visible_column(widths: &[usize], focused: usize, available: usize) -> usize {
    let span = |start: usize| -> usize {
        widths[start..=focused].iter().sum::<usize>() + (focused - start) * COLUMN_SEPARATOR.width()
    };
    if focused >= widths.len() {
        return 0;
    }
    let mut start = 0;
    while start < focused && span(start) > available {
        start += 1;
    }
    start
}

fn render_table(frame: &mut Frame, area: Rect, view: &mut GridView, ctx: &GridRenderContext) {
    let grid = ctx.grid;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let fields = grid.visible_fields();
    let rows = grid.visible_rows();
    view.clamp(rows.len(), fields.len());

    // Header takes one line, the separator another
    let body_height = inner.height.saturating_sub(2) as usize;
    view.follow_cursor(body_height);
    view.body_area = Rect::new(inner.x, inner.y + 2, inner.width, body_height as u16);

    if rows.is_empty() || fields.is_empty() {
        let message = match (grid.lifecycle(), ctx.error) {
            (GridLifecycle::Loading, _) => "Loading…".to_string(),
            (GridLifecycle::Uninitialized, Some(error)) => error.to_string(),
            _ => grid
                .notices()
                .first()
                .map(|n| n.message().to_string())
                .unwrap_or_else(|| "No rows".to_string()),
        };
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(message, Style::default().fg(Color::Yellow))),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let multi = grid.selection().multi_select();
    let marker_width = if multi { 4 } else { 2 };
    let widths = column_widths(&fields, &rows);
    let available = (inner.width as usize).saturating_sub(marker_width);
    let start = first_visible_column(&widths, view.column, available);
    let sort = grid.sort_state();

    // Header
    let mut header = vec![Span::raw(" ".repeat(marker_width))];
    for (i, field) in fields.iter().enumerate().skip(start) {
        let arrow = match sort {
            Some(s) if s.field == field.name => s.direction.arrow(),
            _ => "",
        };
        let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        if i == view.column {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        let label = format!("{} {}", field.display_label(), arrow);
        header.push(Span::styled(fit_to_width(label.trim_end(), widths[i]), style));
        header.push(Span::raw(COLUMN_SEPARATOR));
    }

    let separator: String = widths[start..]
        .iter()
        .map(|w| "─".repeat(*w))
        .collect::<Vec<_>>()
        .join("─┼─");

    let mut lines = vec![
        Line::from(header),
        Line::from(Span::styled(
            format!("{}{}", "─".repeat(marker_width), separator),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    for (position, row) in rows.iter().enumerate().skip(view.scroll).take(body_height) {
        let marker = match (multi, row.selected) {
            (true, true) => "[x] ",
            (true, false) => "[ ] ",
            (false, true) => "● ",
            (false, false) => "  ",
        };
        let mut spans = vec![Span::styled(marker, Style::default().fg(Color::Green))];

        for (i, field) in fields.iter().enumerate().skip(start) {
            let style = if row.is_duplicate(&field.name) {
                Style::default().fg(Color::DarkGray)
            } else if row.selected {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::styled(fit_to_width(&field.render_cell(row.row), widths[i]), style));
            spans.push(Span::raw(COLUMN_SEPARATOR));
        }

        let mut line = Line::from(spans);
        if position == view.cursor {
            line = line.style(Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD));
        } else if view.hovered == Some(position) {
            line = line.style(Style::default().add_modifier(Modifier::REVERSED));
        }
        lines.push(line);
    }

    frame.render_widget(Paragraph::new(lines), inner);

    if rows.len() > body_height {
        let mut scrollbar_state =
            ScrollbarState::new(rows.len().saturating_sub(body_height)).position(view.scroll);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓")),
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, ctx: &GridRenderContext, notices: &str) {
    let line = if let Some(error) = ctx.error {
        Line::from(Span::styled(format!(" {}", error), Style::default().fg(Color::Red)))
    } else if let Some(message) = ctx.status_message {
        Line::from(Span::styled(format!(" {}", message), Style::default().fg(Color::Green)))
    } else {
        Line::from(Span::styled(format!(" {}", notices), Style::default().fg(Color::Yellow)))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help_bar(frame: &mut Frame, area: Rect, view: &GridView) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let spans = if view.search_mode {
        vec![
            key(" Enter "),
            Span::raw("Keep  "),
            key(" Esc "),
            Span::raw("Clear search"),
        ]
    } else {
        vec![
            key(" j/k "),
            Span::raw("Move  "),
            key(" h/l "),
            Span::raw("Column  "),
            key(" s "),
            Span::raw("Sort  "),
            key(" / "),
            Span::raw("Search  "),
            key(" f "),
            Span::raw("Filter  "),
            key(" c "),
            Span::raw("Columns  "),
            key(" Space "),
            Span::raw("Select  "),
            key(" E "),
            Span::raw("Export  "),
            key(" ? "),
            Span::raw("Help  "),
            key(" q "),
            Span::raw("Quit"),
        ]
    };
    let help = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, area);
}
