//! Root application component
//!
//! The App owns the `GridController` and is the only place that mutates it.
//! Child components turn events into Actions; `update` applies them to the
//! grid and keeps the components' view state in step.

use crate::action::Action;
use crate::component::Component;
use crate::components::{
    draw_grid_screen, ColumnDialog, ExportDialog, FilterDialog, GridRenderContext, GridView,
    HelpDialog, QuitDialog, RecordDialog,
};
use crate::modal::{Modal, ModalStack};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, MouseEvent};
use datagrid::config::GridConfig;
use datagrid::model::{
    value, ExportOptions, FileStorage, FormMode, GridController, Modifiers, PersistenceStore, Row,
    RowAction, RowKey,
};
use datagrid::services::{DataSource, LoadedRows, SourceLoader};
use datagrid::GridError;
use ratatui::{layout::Rect, Frame};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// App Struct
// ═══════════════════════════════════════════════════════════════════════════════

pub struct App {
    pub grid: GridController,

    /// Construction settings, kept to rebuild the grid on a view reset
    config: GridConfig,
    state_dir: Option<PathBuf>,
    data_path: PathBuf,
    export_dir: PathBuf,

    /// Background resolver for the data file
    loader: SourceLoader,

    pub modals: ModalStack,
    pub should_quit: bool,

    /// Why the data file could not be loaded; shown in place of rows
    pub load_error: Option<String>,
    /// Transient error for the status line, cleared on the next key press
    pub error: Option<String>,
    pub status_message: Option<String>,

    /// Messages queued by grid row callbacks
    events: Rc<RefCell<Vec<String>>>,

    // ─────────────────────────────────────────────────────────────────────────
    // Child Components
    // ─────────────────────────────────────────────────────────────────────────
    pub grid_view: GridView,
    pub column_dialog: ColumnDialog,
    pub filter_dialog: FilterDialog,
    pub export_dialog: ExportDialog,
    pub record_dialog: RecordDialog,
    pub quit_dialog: QuitDialog,
    pub help_dialog: HelpDialog,
}

// ═══════════════════════════════════════════════════════════════════════════════
// App Implementation
// ═══════════════════════════════════════════════════════════════════════════════

impl App {
    pub fn new(
        config: GridConfig,
        state_dir: Option<PathBuf>,
        data_path: PathBuf,
        export_dir: PathBuf,
        load_timeout: Option<Duration>,
    ) -> Result<App> {
        let grid = build_grid(&config, state_dir.as_ref())?;
        let mut app = App {
            grid,
            quit_dialog: QuitDialog {
                persists_state: state_dir.is_some(),
            },
            config,
            state_dir,
            data_path,
            export_dir,
            loader: SourceLoader::new(load_timeout),
            modals: ModalStack::new(),
            should_quit: false,
            load_error: None,
            error: None,
            status_message: None,
            events: Rc::new(RefCell::new(Vec::new())),
            grid_view: GridView::new(),
            column_dialog: ColumnDialog::new(),
            filter_dialog: FilterDialog::new(),
            export_dialog: ExportDialog::new(),
            record_dialog: RecordDialog::default(),
            help_dialog: HelpDialog::default(),
        };
        app.register_callbacks();
        Ok(app)
    }

    /// Report row events on the status line
    fn register_callbacks(&mut self) {
        let verbs = [
            (RowAction::Activate, "Opened"),
            (RowAction::Create, "Created"),
            (RowAction::Update, "Updated"),
            (RowAction::Duplicate, "Duplicated"),
            (RowAction::Delete, "Deleted"),
        ];
        for (action, verb) in verbs {
            let events = Rc::clone(&self.events);
            self.grid.on(action, move |row, grid| {
                let message = format!("{} {}", verb, describe_row(row, grid));
                tracing::info!(grid = grid.id(), "{}", message);
                events.borrow_mut().push(message);
            });
        }
        self.grid.on(RowAction::MouseOver, |row, grid| {
            tracing::trace!(row = %describe_row(row, grid), "hover");
        });
    }

    /// Start loading the data file in the background
    pub fn request_load(&mut self) {
        self.grid.begin_loading();
        self.loader.request(DataSource::File(self.data_path.clone()));
    }

    fn poll_loader(&mut self) {
        if let Some(outcome) = self.loader.poll() {
            self.apply_load(outcome);
        }
    }

    pub fn apply_load(&mut self, outcome: std::result::Result<LoadedRows, GridError>) {
        let result = match outcome {
            Ok(loaded) => self.grid.complete_load(loaded),
            Err(e) => {
                self.grid.fail_load(&e);
                Err(e)
            }
        };
        match result {
            Ok(()) => {
                self.load_error = None;
                self.status_message = Some(format!("Loaded {} rows", self.grid.len()));
                self.sync_search();
            }
            Err(e) => {
                let message = format!("Could not load {}: {}", self.data_path.display(), e);
                if self.grid.is_empty() {
                    self.load_error = Some(message);
                } else {
                    self.error = Some(message);
                }
            }
        }
    }

    /// Drop persisted state and start again from the configuration
    fn reset_view(&mut self) -> Result<()> {
        self.grid.clear_persisted_state();
        self.grid = build_grid(&self.config, self.state_dir.as_ref())?;
        self.register_callbacks();
        self.grid_view = GridView::new();
        self.request_load();
        self.status_message = Some("View reset".to_string());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Row lookup
    // ─────────────────────────────────────────────────────────────────────────

    fn key_at(&self, index: usize) -> Option<RowKey> {
        self.grid.visible_keys().into_iter().nth(index)
    }

    pub fn cursor_key(&self) -> Option<RowKey> {
        self.key_at(self.grid_view.cursor)
    }

    fn focused_field(&self) -> Option<String> {
        self.grid
            .visible_fields()
            .get(self.grid_view.column)
            .map(|f| f.name.clone())
    }

    fn sync_search(&mut self) {
        if self.grid.search_query() != self.grid_view.search_input {
            self.grid.search(&self.grid_view.search_input);
        }
    }

    fn report(&mut self, error: impl std::fmt::Display) {
        tracing::warn!(error = %error, "action failed");
        self.error = Some(error.to_string());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Records and export
    // ─────────────────────────────────────────────────────────────────────────

    fn open_record(&mut self, mode: FormMode) {
        let key = if mode.needs_row() {
            match self.cursor_key() {
                Some(key) => Some(key),
                None => {
                    self.report("No row under the cursor");
                    return;
                }
            }
        } else {
            None
        };
        match self.grid.form(key.as_ref(), mode) {
            Ok(form) => {
                self.record_dialog.open(mode, key, form);
                // A view form switching to edit replaces itself
                if matches!(self.modals.top(), Some(Modal::Record(_))) {
                    self.modals.pop();
                }
                self.modals.push(Modal::Record(mode));
            }
            Err(e) => self.report(e),
        }
    }

    fn submit_record(&mut self) {
        let mode = self.record_dialog.mode;
        let form = match self.record_dialog.submitted() {
            Ok(form) => form,
            Err(e) => {
                self.record_dialog.error = Some(e.to_string());
                return;
            }
        };
        let key = self.record_dialog.key.clone();
        match self.grid.submit_form(key.as_ref(), mode, &form) {
            Ok(_) => {
                self.modals.pop();
            }
            Err(e) => self.record_dialog.error = Some(e.to_string()),
        }
    }

    fn export(&mut self, options: &ExportOptions) {
        let written = self.grid.export(options).map_err(anyhow::Error::from).and_then(|export| {
            let path = self.export_dir.join(&export.filename);
            fs::write(&path, &export.content)?;
            Ok(path)
        });
        match written {
            Ok(path) => {
                tracing::info!(path = %path.display(), "exported csv");
                self.status_message = Some(format!("Exported to {}", path.display()));
                self.modals.pop();
            }
            Err(e) => self.report(format!("Export failed: {}", e)),
        }
    }

    fn toggle_select_all(&mut self) {
        let visible = self.grid.visible_keys();
        let all_selected = !visible.is_empty() && visible.iter().all(|key| self.grid.is_selected(key));
        self.grid.toggle_all_select(!all_selected);
    }

    fn hover(&mut self, index: usize) {
        if let Some(previous) = self.grid_view.hovered.and_then(|i| self.key_at(i)) {
            self.grid.hover_out(&previous);
        }
        if let Some(key) = self.key_at(index) {
            self.grid.hover(&key);
            self.grid_view.hovered = Some(index);
        }
    }

    fn drain_events(&mut self) {
        let mut events = self.events.borrow_mut();
        if let Some(last) = events.pop() {
            self.status_message = Some(last);
        }
        events.clear();
    }
}

fn build_grid(config: &GridConfig, state_dir: Option<&PathBuf>) -> Result<GridController> {
    let persistence = state_dir
        .map(|dir| PersistenceStore::new(Box::new(FileStorage::new(dir.clone())), config.storage_prefix.clone()));
    Ok(GridController::new(config.clone(), persistence)?)
}

/// Short name of a row for messages: its identifier, else its first cell
fn describe_row(row: &Row, grid: &GridController) -> String {
    if let Some(id) = grid.config().identifier.as_deref().and_then(|id| row.get(id)) {
        return value::text(Some(id));
    }
    grid.visible_fields()
        .first()
        .map(|field| field.render_cell(row))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "row".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Component Implementation
// ═══════════════════════════════════════════════════════════════════════════════

impl Component for App {
    fn init(&mut self) -> Result<()> {
        self.request_load();
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        self.error = None;
        self.status_message = None;

        if let Some(modal) = self.modals.top().cloned() {
            self.handle_modal_key_event(&modal, key)
        } else if self.grid_view.search_mode {
            self.handle_search_key_event(key)
        } else {
            self.grid_view.handle_key_event(key)
        }
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        if self.modals.is_empty() {
            self.grid_view.handle_mouse_event(mouse)
        } else {
            Ok(None)
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let len = self.grid.visible_len();
        match action {
            // ─────────────────────────────────────────────────────────────────
            // App Lifecycle
            // ─────────────────────────────────────────────────────────────────
            Action::Tick => {
                self.poll_loader();
                self.drain_events();
            }
            Action::Resize(_, _) => {}
            Action::ForceQuit => {
                self.should_quit = true;
            }
            // ─────────────────────────────────────────────────────────────────
            // Navigation (delegate to GridView)
            // ─────────────────────────────────────────────────────────────────
            Action::NextRow => self.grid_view.next(len),
            Action::PrevRow => self.grid_view.previous(),
            Action::FirstRow => self.grid_view.first(),
            Action::LastRow => self.grid_view.last(len),
            Action::PageDown => self.grid_view.page_down(len),
            Action::PageUp => self.grid_view.page_up(),
            Action::NextColumn => {
                let columns = self.grid.visible_fields().len();
                self.grid_view.next_column(columns);
            }
            Action::PrevColumn => self.grid_view.previous_column(),
            Action::HoverRow(index) => self.hover(index),
            // ─────────────────────────────────────────────────────────────────
            // Sort
            // ─────────────────────────────────────────────────────────────────
            Action::ToggleSort => {
                if let Some(field) = self.focused_field() {
                    if let Err(e) = self.grid.toggle_sort(&field) {
                        self.report(e);
                    }
                }
            }
            // ─────────────────────────────────────────────────────────────────
            // Search
            // ─────────────────────────────────────────────────────────────────
            Action::EnterSearchMode => self.grid_view.enter_search_mode(),
            Action::ExitSearchMode => self.grid_view.exit_search_mode(),
            Action::SearchInput(c) => {
                self.grid_view.search_input(c);
                self.sync_search();
            }
            Action::SearchBackspace => {
                self.grid_view.search_backspace();
                self.sync_search();
            }
            Action::ClearSearch => {
                self.grid_view.clear_search();
                self.sync_search();
            }
            // ─────────────────────────────────────────────────────────────────
            // Selection
            // ─────────────────────────────────────────────────────────────────
            Action::SelectRow | Action::ExtendSelection => {
                let modifiers = if action == Action::ExtendSelection {
                    Modifiers::SHIFT
                } else {
                    Modifiers::NONE
                };
                if let Some(key) = self.cursor_key() {
                    self.grid.select(&key, modifiers);
                }
            }
            Action::ClickRow { index, shift } => {
                if let Some(key) = self.key_at(index) {
                    self.grid_view.cursor = index;
                    let modifiers = if shift { Modifiers::SHIFT } else { Modifiers::NONE };
                    self.grid.select(&key, modifiers);
                }
            }
            Action::ToggleSelectAll => self.toggle_select_all(),
            Action::ClearSelection => {
                self.grid.deselect_all();
            }
            Action::ActivateRow => {
                if let Some(key) = self.cursor_key() {
                    self.grid.double_click(&key);
                    self.open_record(FormMode::View);
                }
            }
            // ─────────────────────────────────────────────────────────────────
            // Modals
            // ─────────────────────────────────────────────────────────────────
            Action::OpenQuitDialog => self.modals.push(Modal::QuitConfirm),
            Action::OpenHelp => {
                self.help_dialog.scroll_offset = 0;
                self.modals.toggle(Modal::Help);
            }
            Action::OpenColumns => {
                self.column_dialog.set_columns(self.grid.fields());
                self.modals.push(Modal::Columns);
            }
            Action::OpenFilter => {
                self.filter_dialog.reset(self.grid.fields());
                self.modals.push(Modal::Filter);
            }
            Action::OpenExport => {
                self.export_dialog.reset(&self.grid.config().export);
                self.modals.push(Modal::Export);
            }
            Action::OpenRecord(mode) => self.open_record(mode),
            Action::CloseModal => {
                self.modals.pop();
            }
            Action::ConfirmModal => match self.modals.top().cloned() {
                Some(Modal::QuitConfirm) => self.should_quit = true,
                Some(Modal::Record(_)) => self.submit_record(),
                _ => {}
            },
            // Dialogs move their own highlight before emitting these
            Action::ModalUp | Action::ModalDown => {}
            // ─────────────────────────────────────────────────────────────────
            // Columns and Filters
            // ─────────────────────────────────────────────────────────────────
            Action::ToggleColumn(name) => match self.grid.toggle_column(&name) {
                Ok(_) => self.column_dialog.set_columns(self.grid.fields()),
                Err(e) => self.report(e),
            },
            Action::AddFilter {
                field,
                comparator,
                input,
            } => match self.grid.add_filter_input(&field, comparator, &input) {
                Ok(()) => {
                    self.modals.pop();
                    self.grid_view.cursor = 0;
                }
                Err(e) => self.report(e),
            },
            Action::RemoveLastFilter => {
                let count = self.grid.filters().len();
                if count > 0 {
                    self.grid.remove_filter(count - 1);
                }
            }
            Action::ClearFilters => self.grid.clear_filters(),
            // ─────────────────────────────────────────────────────────────────
            // Data
            // ─────────────────────────────────────────────────────────────────
            Action::ExportCsv(options) => self.export(&options),
            Action::Reload => self.request_load(),
            Action::ResetView => self.reset_view()?,
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let ctx = GridRenderContext {
            grid: &self.grid,
            loading: self.loader.is_pending(),
            error: self.error.as_deref().or(self.load_error.as_deref()),
            status_message: self.status_message.as_deref(),
        };
        draw_grid_screen(frame, area, &mut self.grid_view, &ctx)?;

        if let Some(modal) = self.modals.top().cloned() {
            self.draw_modal(frame, area, &modal)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helper Methods
// ═══════════════════════════════════════════════════════════════════════════════

impl App {
    fn handle_modal_key_event(&mut self, modal: &Modal, key: KeyEvent) -> Result<Option<Action>> {
        match modal {
            Modal::QuitConfirm => self.quit_dialog.handle_key_event(key),
            Modal::Help => self.help_dialog.handle_key_event(key),
            Modal::Columns => self.column_dialog.handle_key_event(key),
            Modal::Filter => self.filter_dialog.handle_key_event(key),
            Modal::Export => self.export_dialog.handle_key_event(key),
            Modal::Record(_) => self.record_dialog.handle_key_event(key),
        }
    }

    fn handle_search_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Enter => Some(Action::ExitSearchMode),
            KeyCode::Esc => Some(Action::ClearSearch),
            KeyCode::Backspace => Some(Action::SearchBackspace),
            KeyCode::Char(c) => Some(Action::SearchInput(c)),
            _ => None,
        };
        Ok(action)
    }

    fn draw_modal(&mut self, frame: &mut Frame, area: Rect, modal: &Modal) -> Result<()> {
        match modal {
            Modal::QuitConfirm => self.quit_dialog.draw(frame, area),
            Modal::Help => self.help_dialog.draw(frame, area),
            Modal::Columns => self.column_dialog.draw(frame, area),
            Modal::Filter => self.filter_dialog.draw(frame, area),
            Modal::Export => self.export_dialog.draw(frame, area),
            Modal::Record(_) => self.record_dialog.draw(frame, area),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagrid::model::{Comparator, SortDirection};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    const PEOPLE: &str = r#"{"data": [
        {"id": 1, "name": "Ada", "age": 36},
        {"id": 2, "name": "Bo", "age": 25},
        {"id": 3, "name": "Cy", "age": 41}
    ]}"#;

    fn app_with(dir: &TempDir, state: bool) -> App {
        let data = dir.path().join("people.json");
        fs::write(&data, PEOPLE).unwrap();
        let config = GridConfig::new("people", Vec::new()).with_multi_select(true);
        let state_dir = state.then(|| dir.path().join("state"));
        let mut app = App::new(config, state_dir, data, dir.path().to_path_buf(), None).unwrap();
        app.init().unwrap();
        wait_for_load(&mut app);
        app
    }

    fn wait_for_load(app: &mut App) {
        let outcome = app.loader.wait().expect("a load was requested");
        app.apply_load(outcome);
    }

    fn names(app: &App) -> Vec<String> {
        app.grid
            .visible_rows()
            .iter()
            .map(|view| value::text(view.row.get("name")))
            .collect()
    }

    fn run(app: &mut App, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            app.update(action).unwrap();
        }
    }

    #[test]
    fn test_loads_and_infers_columns() {
        let dir = TempDir::new().unwrap();
        let app = app_with(&dir, false);
        assert_eq!(app.grid.len(), 3);
        assert_eq!(app.status_message.as_deref(), Some("Loaded 3 rows"));
        assert_eq!(app.grid.config().identifier.as_deref(), Some("id"));
    }

    #[test]
    fn test_sort_toggles_on_focused_column() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        // Inferred columns are alphabetical: age, id, name
        run(&mut app, [Action::ToggleSort]);
        assert_eq!(names(&app), vec!["Bo", "Ada", "Cy"]);
        run(&mut app, [Action::ToggleSort]);
        assert_eq!(names(&app), vec!["Cy", "Ada", "Bo"]);
        assert_eq!(app.grid.sort_state().map(|s| s.direction), Some(SortDirection::Desc));
    }

    #[test]
    fn test_search_input_narrows_rows() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::EnterSearchMode, Action::SearchInput('c'), Action::SearchInput('y')]);
        assert_eq!(names(&app), vec!["Cy"]);
        run(&mut app, [Action::ClearSearch]);
        assert_eq!(app.grid.visible_len(), 3);
        assert!(!app.grid_view.search_mode);
    }

    #[test]
    fn test_range_selection_and_select_all() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(
            &mut app,
            [Action::SelectRow, Action::NextRow, Action::NextRow, Action::ExtendSelection],
        );
        assert_eq!(app.grid.selection().selected().len(), 3);

        run(&mut app, [Action::ToggleSelectAll]);
        assert!(app.grid.selection().selected().is_empty());
        run(&mut app, [Action::ClickRow { index: 1, shift: false }]);
        assert_eq!(app.grid_view.cursor, 1);
        assert!(app.grid.is_selected(&RowKey::Id("2".to_string())));
    }

    #[test]
    fn test_filter_actions() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(
            &mut app,
            [
                Action::OpenFilter,
                Action::AddFilter {
                    field: "age".to_string(),
                    comparator: Comparator::IsGreaterThan,
                    input: "30".to_string(),
                },
            ],
        );
        assert!(app.modals.is_empty());
        assert_eq!(names(&app), vec!["Ada", "Cy"]);

        run(
            &mut app,
            [Action::AddFilter {
                field: "age".to_string(),
                comparator: Comparator::IsGreaterThan,
                input: "old".to_string(),
            }],
        );
        assert!(app.error.is_some());
        assert_eq!(app.grid.filters().len(), 1);

        run(&mut app, [Action::RemoveLastFilter]);
        assert_eq!(app.grid.visible_len(), 3);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::ToggleColumn("id".to_string())]);

        let options = ExportOptions {
            filename: Some("out.csv".to_string()),
            ..ExportOptions::default()
        };
        run(&mut app, [Action::OpenExport, Action::ExportCsv(options)]);

        let written = fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert_eq!(written.lines().next(), Some("\"age\",\"name\""));
        assert_eq!(written.lines().count(), 4);
        assert!(app.modals.is_empty());
    }

    #[test]
    fn test_edit_record_reports_update() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::OpenRecord(FormMode::Edit)]);
        assert_eq!(app.modals.top(), Some(&Modal::Record(FormMode::Edit)));

        let name = app.record_dialog.fields.iter().position(|f| f.name == "name").unwrap();
        app.record_dialog.inputs[name] = "Adele".to_string();
        run(&mut app, [Action::ConfirmModal, Action::Tick]);

        assert!(app.modals.is_empty());
        assert_eq!(app.grid.get("1").unwrap()["name"], json!("Adele"));
        assert_eq!(app.status_message.as_deref(), Some("Updated 1"));
    }

    #[test]
    fn test_create_with_taken_identifier_stays_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::OpenRecord(FormMode::Create)]);

        let position = |name: &str| app.record_dialog.fields.iter().position(|f| f.name == name).unwrap();
        let (id, name) = (position("id"), position("name"));
        app.record_dialog.inputs[id] = "1".to_string();
        app.record_dialog.inputs[name] = "Zed".to_string();
        run(&mut app, [Action::ConfirmModal]);

        assert_eq!(app.modals.top(), Some(&Modal::Record(FormMode::Create)));
        assert!(app
            .record_dialog
            .error
            .as_deref()
            .is_some_and(|e| e.contains("already exists")));
        assert_eq!(app.grid.len(), 3);
        assert_eq!(app.grid.get("1").unwrap()["name"], json!("Ada"));
    }

    #[test]
    fn test_delete_record() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::OpenRecord(FormMode::Delete), Action::ConfirmModal]);
        assert_eq!(app.grid.len(), 2);
        assert!(app.grid.get("1").is_none());
    }

    #[test]
    fn test_activate_opens_view_form() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(&dir, false);
        run(&mut app, [Action::ActivateRow, Action::Tick]);
        assert_eq!(app.modals.top(), Some(&Modal::Record(FormMode::View)));
        assert_eq!(app.status_message.as_deref(), Some("Opened 1"));

        // Switching to edit replaces the view form
        run(&mut app, [Action::OpenRecord(FormMode::Edit)]);
        assert_eq!(app.modals.top(), Some(&Modal::Record(FormMode::Edit)));
        run(&mut app, [Action::CloseModal]);
        assert!(app.modals.is_empty());
    }

    #[test]
    fn test_missing_file_sets_load_error() {
        let dir = TempDir::new().unwrap();
        let config = GridConfig::new("ghost", Vec::new());
        let mut app = App::new(config, None, dir.path().join("nope.json"), dir.path().to_path_buf(), None).unwrap();
        app.init().unwrap();
        wait_for_load(&mut app);
        assert!(app.load_error.as_deref().is_some_and(|e| e.contains("nope.json")));
    }

    #[test]
    fn test_view_state_survives_restart_and_reset() {
        let dir = TempDir::new().unwrap();
        {
            let mut app = app_with(&dir, true);
            run(&mut app, [Action::ToggleSort, Action::ToggleColumn("id".to_string())]);
        }

        let mut app = app_with(&dir, true);
        assert_eq!(names(&app), vec!["Bo", "Ada", "Cy"]);
        assert!(app.grid.field("id").unwrap().hidden);

        run(&mut app, [Action::ResetView]);
        wait_for_load(&mut app);
        assert!(app.grid.sort_state().is_none());
        assert_eq!(names(&app), vec!["Ada", "Bo", "Cy"]);
    }
}
