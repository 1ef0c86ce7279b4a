//! Grid orchestration
//!
//! [`GridController`] owns the rows of one grid and composes sorting,
//! filtering, search, selection, export and persistence over them. Filters
//! and search only flag rows; the row set itself changes through loads and
//! entry operations.
//!
//! Lifecycle: `Uninitialized → Loading → Ready`. A grid becomes ready once
//! rows have been applied and the persisted sort, filters and selection have
//! been re-applied to them.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::model::export::{self, CsvExport, ExportOptions, CSV_MIME_TYPE};
use crate::model::field::{self, Comparator, FieldDescriptor};
use crate::model::filter::{self, FilterPredicate};
use crate::model::form::{self, FormField, FormMode};
use crate::model::persistence::{PersistedState, PersistenceStore, STATE_VERSION};
use crate::model::row_store::{RowKey, RowStore, StoredRow};
use crate::model::search;
use crate::model::selection::{Modifiers, SelectionChange, SelectionController};
use crate::model::sort::{self, SortDirection, SortState};
use crate::model::value::Row;
use crate::services::source::{self, DataSource, LoadedRows};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridLifecycle {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Expected empty states, shown inline instead of rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridNotice {
    /// Active filters exclude every row
    NoMatchingRows,
    NoSearchResults,
    /// The search only matches text in hidden columns
    SearchMatchesHidden,
    NoVisibleColumns,
}

impl GridNotice {
    pub fn message(&self) -> &'static str {
        match self {
            GridNotice::NoMatchingRows => "No rows match the active filters",
            GridNotice::NoSearchResults => "No rows match the search",
            GridNotice::SearchMatchesHidden => "Matches exist only in hidden columns",
            GridNotice::NoVisibleColumns => "All columns are hidden",
        }
    }
}

/// Row events a collaborator can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowAction {
    Select,
    Deselect,
    /// Double-click or Enter
    Activate,
    MouseOver,
    MouseOut,
    Create,
    Update,
    Delete,
    Duplicate,
}

pub type RowCallback = Box<dyn FnMut(&Row, &GridController)>;
pub type RowComparator = Box<dyn Fn(&Row, &Row) -> Ordering>;

#[derive(Default)]
pub struct GridCallbacks {
    handlers: Vec<(RowAction, RowCallback)>,
}

impl fmt::Debug for GridCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(action, _)| action))
            .finish()
    }
}

impl GridCallbacks {
    fn handles(&self, action: RowAction) -> bool {
        self.handlers.iter().any(|(a, _)| *a == action)
    }

    fn invoke(&mut self, action: RowAction, row: &Row, grid: &GridController) {
        for (a, callback) in &mut self.handlers {
            if *a == action {
                callback(row, grid);
            }
        }
    }
}

/// One displayed row
#[derive(Debug, Clone)]
pub struct ViewRow<'a> {
    pub key: RowKey,
    pub row: &'a Row,
    pub selected: bool,
    /// Fields whose cell repeats the cell above it
    pub duplicates: Vec<String>,
}

impl ViewRow<'_> {
    pub fn is_duplicate(&self, field: &str) -> bool {
        self.duplicates.iter().any(|name| name == field)
    }
}

pub struct GridController {
    config: GridConfig,
    fields: Vec<FieldDescriptor>,
    store: RowStore,
    /// Row tokens in display order
    order: Vec<u64>,
    /// Token to position in the store
    index: HashMap<u64, usize>,
    filtered: HashSet<u64>,
    searched_out: HashSet<u64>,
    hidden_matches: usize,
    sort: Option<SortState>,
    comparator: Option<RowComparator>,
    filters: Vec<FilterPredicate>,
    search_query: String,
    selection: SelectionController,
    persistence: Option<PersistenceStore>,
    state_key: String,
    /// Stored state waiting for fields to be known
    deferred_state: Option<PersistedState>,
    pending_selection: Option<RowKey>,
    callbacks: GridCallbacks,
    lifecycle: GridLifecycle,
    loaded_once: bool,
    notices: Vec<GridNotice>,
}

impl GridController {
    /// Build a grid from `config`, restoring its stored view state if any
    pub fn new(config: GridConfig, persistence: Option<PersistenceStore>) -> Result<Self> {
        let config = config.validate()?;
        let state_key = persistence
            .as_ref()
            .map(|p| p.key_for(&config.id))
            .unwrap_or_default();

        let mut grid = Self {
            fields: config.fields.clone(),
            store: RowStore::new(config.identifier.clone()),
            order: Vec::new(),
            index: HashMap::new(),
            filtered: HashSet::new(),
            searched_out: HashSet::new(),
            hidden_matches: 0,
            sort: config.default_sort.clone(),
            comparator: None,
            filters: Vec::new(),
            search_query: String::new(),
            selection: SelectionController::new(config.multi_select, config.select_self),
            persistence,
            state_key,
            deferred_state: None,
            pending_selection: None,
            callbacks: GridCallbacks::default(),
            lifecycle: GridLifecycle::Uninitialized,
            loaded_once: false,
            notices: Vec::new(),
            config,
        };

        let stored = grid
            .persistence
            .as_ref()
            .and_then(|p| p.load(&grid.state_key));
        if let Some(state) = stored {
            if grid.fields.is_empty() {
                grid.deferred_state = Some(state);
            } else {
                grid.apply_state(state);
            }
        }
        grid.update_notices();
        Ok(grid)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn lifecycle(&self) -> GridLifecycle {
        self.lifecycle
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        field::find(&self.fields, name)
    }

    pub fn visible_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| !f.hidden).collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Every row in insertion order, filtered or not
    pub fn get_all(&self) -> Vec<&Row> {
        self.store.get_all()
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.store.get(id)
    }

    pub fn row(&self, key: &RowKey) -> Option<&Row> {
        self.store.get_by_key(key)
    }

    pub fn is_filtered(&self, key: &RowKey) -> bool {
        self.store
            .position(key)
            .and_then(|i| self.store.entries().get(i))
            .is_some_and(|stored| self.filtered.contains(&stored.token))
    }

    pub fn notices(&self) -> &[GridNotice] {
        &self.notices
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn is_selected(&self, key: &RowKey) -> bool {
        self.selection.is_selected(key)
    }

    pub fn selected_rows(&self) -> Vec<&Row> {
        self.selection
            .selected()
            .iter()
            .filter_map(|key| self.store.get_by_key(key))
            .collect()
    }

    /// Register a callback for a row event
    pub fn on(&mut self, action: RowAction, callback: impl FnMut(&Row, &GridController) + 'static) {
        self.callbacks.handlers.push((action, Box::new(callback)));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Loading
    // ═══════════════════════════════════════════════════════════════════════

    pub fn begin_loading(&mut self) {
        tracing::debug!(grid = %self.config.id, "loading");
        self.lifecycle = GridLifecycle::Loading;
    }

    /// Resolve `source` and replace the rows with its contents
    ///
    /// On failure the error is logged and returned and the grid keeps the
    /// rows it had.
    pub fn load(&mut self, source: DataSource) -> Result<()> {
        self.begin_loading();
        match source.resolve() {
            Ok(loaded) => self.complete_load(loaded),
            Err(e) => {
                self.fail_load(&e);
                Err(e)
            }
        }
    }

    /// Apply rows resolved elsewhere, e.g. by a background loader
    pub fn complete_load(&mut self, loaded: LoadedRows) -> Result<()> {
        if self.fields.is_empty() {
            let fields = if loaded.fields.is_empty() {
                source::infer_fields(&loaded.rows)
            } else {
                loaded.fields
            };
            if let Err(e) = self.adopt_fields(fields, loaded.identifier) {
                self.fail_load(&e);
                return Err(e);
            }
        }

        self.store.clear();
        for row in loaded.rows {
            self.store.upsert_by_identifier(row);
        }
        self.forget_missing_selection();
        self.refresh();

        let mut restored = SelectionChange::default();
        if let Some(key) = self.pending_selection.take() {
            if self.store.position(&key).is_some() && !self.selection.is_selected(&key) {
                let ordered = self.visible_keys();
                restored = self.selection.select(&key, Modifiers::NONE, &ordered);
            }
        }

        self.lifecycle = GridLifecycle::Ready;
        self.loaded_once = true;
        tracing::debug!(grid = %self.config.id, rows = self.store.len(), "ready");

        // A restored selection is reported like a click
        for key in &restored.selected {
            self.fire(RowAction::Select, key);
        }
        Ok(())
    }

    /// Record a failed load; the grid keeps its last good rows
    pub fn fail_load(&mut self, error: &GridError) {
        tracing::error!(grid = %self.config.id, error = %error, "failed to load data source");
        self.lifecycle = if self.loaded_once {
            GridLifecycle::Ready
        } else {
            GridLifecycle::Uninitialized
        };
    }

    fn adopt_fields(&mut self, fields: Vec<FieldDescriptor>, identifier: Option<String>) -> Result<()> {
        let mut config = self.config.clone();
        config.fields = fields;
        if config.identifier.is_none() {
            config.identifier = identifier;
        }
        // An inferred `id` flag yields to an explicitly configured identifier
        if let Some(configured) = config.identifier.clone() {
            for field in &mut config.fields {
                field.identifier = field.name == configured;
            }
        }
        let config = config.validate()?;

        self.fields = config.fields.clone();
        self.store = RowStore::new(config.identifier.clone());
        self.config = config;
        if let Some(state) = self.deferred_state.take() {
            self.apply_state(state);
        }
        Ok(())
    }

    /// Upsert `rows` by identifier
    pub fn update(&mut self, rows: Vec<Row>) {
        for row in rows {
            self.store.upsert_by_identifier(row);
        }
        self.refresh();
    }

    /// Clear, then upsert `rows`
    pub fn replace(&mut self, rows: Vec<Row>) {
        self.store.clear();
        self.update(rows);
        self.forget_missing_selection();
        self.persist();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry operations
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_entry(&mut self, row: Row) -> RowKey {
        let key = self.store.upsert_by_identifier(row);
        self.refresh();
        key
    }

    /// Merge `row` into the existing row with the same identifier
    pub fn update_entry(&mut self, row: Row) -> Result<RowKey> {
        let id = self
            .store
            .id_of(&row)
            .ok_or_else(|| GridError::RowNotFound("row has no identifier value".to_string()))?;
        if self.store.get(&id).is_none() {
            return Err(GridError::RowNotFound(id));
        }
        let key = self.store.upsert_by_identifier(row);
        self.refresh();
        Ok(key)
    }

    pub fn delete_entry(&mut self, key: &RowKey) -> Result<Row> {
        let row = self
            .store
            .remove(key)
            .ok_or_else(|| GridError::RowNotFound(key.to_string()))?;
        let was_selected = self.selection.is_selected(key);
        self.selection.forget(key);
        self.refresh();
        if was_selected {
            self.persist();
        }
        Ok(row)
    }

    /// Remove by identifier value; absent ids are a no-op
    pub fn delete_by_identifier(&mut self, id: &str) -> Option<Row> {
        self.delete_entry(&RowKey::Id(id.to_string())).ok()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sort
    // ═══════════════════════════════════════════════════════════════════════

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn sort_field(&mut self, field: &str, direction: SortDirection) -> Result<()> {
        self.check_sort(field)?;
        self.sort = Some(SortState::new(field, direction));
        self.sort_order();
        self.persist();
        tracing::debug!(grid = %self.config.id, field, ?direction, "sorted");
        Ok(())
    }

    /// Sort by `field`, flipping the direction if it is already the sort field
    pub fn toggle_sort(&mut self, field: &str) -> Result<SortDirection> {
        let direction = match &self.sort {
            Some(current) if current.field == field => current.direction.reversed(),
            _ => SortDirection::Asc,
        };
        self.sort_field(field, direction)?;
        Ok(direction)
    }

    /// Order rows with a caller comparator instead of a field sort
    pub fn sort_with(&mut self, comparator: RowComparator) {
        self.comparator = Some(comparator);
        self.sort = None;
        self.sort_order();
        self.persist();
    }

    fn check_sort(&self, name: &str) -> Result<&FieldDescriptor> {
        let field = self
            .field(name)
            .ok_or_else(|| GridError::UnknownField(name.to_string()))?;
        if !field.sortable {
            return Err(GridError::NotSortable(name.to_string()));
        }
        Ok(field)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Filters
    // ═══════════════════════════════════════════════════════════════════════

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    /// Descriptions of the active filters, in order
    pub fn filter_tags(&self) -> Vec<String> {
        self.filters
            .iter()
            .map(|p| p.describe(self.field(&p.field)))
            .collect()
    }

    pub fn add_filter(&mut self, predicate: FilterPredicate) -> Result<()> {
        self.check_filter(&predicate)?;
        if !self.filters.contains(&predicate) {
            self.filters.push(predicate);
        }
        self.apply_filters();
        self.persist();
        Ok(())
    }

    /// Validate raw input for `field` and add it as a filter
    pub fn add_filter_input(&mut self, field: &str, comparator: Comparator, input: &str) -> Result<()> {
        let descriptor = self
            .field(field)
            .ok_or_else(|| GridError::UnknownField(field.to_string()))?;
        let value = filter::parse_filter_value(descriptor, input)?;
        self.add_filter(FilterPredicate::new(field, comparator, value))
    }

    pub fn remove_filter(&mut self, index: usize) -> Option<FilterPredicate> {
        if index >= self.filters.len() {
            return None;
        }
        let removed = self.filters.remove(index);
        self.apply_filters();
        self.persist();
        Some(removed)
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.apply_filters();
        self.persist();
    }

    /// Replace the whole filter set; nothing changes if any predicate is invalid
    pub fn set_filters(&mut self, filters: Vec<FilterPredicate>) -> Result<()> {
        for predicate in &filters {
            self.check_filter(predicate)?;
        }
        self.filters = filters;
        self.apply_filters();
        self.persist();
        Ok(())
    }

    /// Recompute filtered flags for every row
    pub fn apply_filters(&mut self) {
        self.recompute_filtered();
        self.recompute_search();
        self.update_notices();
        tracing::debug!(
            grid = %self.config.id,
            filters = self.filters.len(),
            filtered = self.filtered.len(),
            "filters applied"
        );
    }

    /// Drop filters without persisting; for views that do not filter
    pub(crate) fn discard_filters(&mut self) {
        self.filters.clear();
        self.apply_filters();
    }

    fn check_filter(&self, predicate: &FilterPredicate) -> Result<()> {
        let field = self
            .field(&predicate.field)
            .ok_or_else(|| GridError::UnknownField(predicate.field.clone()))?;
        predicate.validate(field)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Search and columns
    // ═══════════════════════════════════════════════════════════════════════

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search(&mut self, query: &str) {
        self.search_query = query.to_string();
        self.recompute_search();
        self.update_notices();
    }

    /// Flip a column's visibility; returns the new hidden flag
    pub fn toggle_column(&mut self, name: &str) -> Result<bool> {
        let hidden = !self
            .field(name)
            .ok_or_else(|| GridError::UnknownField(name.to_string()))?
            .hidden;
        self.set_column_hidden(name, hidden)?;
        Ok(hidden)
    }

    pub fn set_column_hidden(&mut self, name: &str, hidden: bool) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| GridError::UnknownField(name.to_string()))?;
        field.hidden = hidden;
        self.recompute_search();
        self.update_notices();
        self.persist();
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Selection and row events
    // ═══════════════════════════════════════════════════════════════════════

    /// Click on a row; range selection runs over the visible rows
    pub fn select(&mut self, key: &RowKey, modifiers: Modifiers) -> SelectionChange {
        let ordered = self.visible_keys();
        let change = self.selection.select(key, modifiers, &ordered);
        self.after_selection(&change);
        change
    }

    pub fn deselect_all(&mut self) -> SelectionChange {
        let change = self.selection.deselect_all();
        self.after_selection(&change);
        change
    }

    /// Select or deselect every visible row
    pub fn toggle_all_select(&mut self, select: bool) -> SelectionChange {
        let visible = self.visible_keys();
        let change = self.selection.toggle_all_select(select, &visible);
        self.after_selection(&change);
        change
    }

    fn after_selection(&mut self, change: &SelectionChange) {
        if change.is_empty() {
            return;
        }
        for key in &change.deselected {
            self.fire(RowAction::Deselect, key);
        }
        for key in &change.selected {
            self.fire(RowAction::Select, key);
        }
        self.persist();
    }

    pub fn double_click(&mut self, key: &RowKey) {
        self.fire(RowAction::Activate, key);
    }

    pub fn hover(&mut self, key: &RowKey) {
        self.fire(RowAction::MouseOver, key);
    }

    pub fn hover_out(&mut self, key: &RowKey) {
        self.fire(RowAction::MouseOut, key);
    }

    fn fire(&mut self, action: RowAction, key: &RowKey) {
        if !self.callbacks.handles(action) {
            return;
        }
        let mut callbacks = std::mem::take(&mut self.callbacks);
        if let Some(row) = self.store.get_by_key(key) {
            callbacks.invoke(action, row, self);
        }
        self.callbacks = callbacks;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // View
    // ═══════════════════════════════════════════════════════════════════════

    /// Rows to display, in order, with duplicate cells flagged
    ///
    /// A cell is a duplicate when its rendered text equals the cell of the
    /// same column in the previous displayed row. Empty cells and `nodupe`
    /// fields are never flagged.
    pub fn visible_rows(&self) -> Vec<ViewRow<'_>> {
        let fields: Vec<&FieldDescriptor> = self.visible_fields().into_iter().filter(|f| !f.nodupe).collect();
        let mut rows = Vec::new();
        let mut previous: Option<&Row> = None;

        for stored in self.shown() {
            let duplicates = match previous {
                Some(above) => fields
                    .iter()
                    .filter(|f| {
                        let text = f.render_cell(&stored.data);
                        !text.is_empty() && text == f.render_cell(above)
                    })
                    .map(|f| f.name.clone())
                    .collect(),
                None => Vec::new(),
            };
            let key = self.store.key_of(stored);
            rows.push(ViewRow {
                selected: self.selection.is_selected(&key),
                key,
                row: &stored.data,
                duplicates,
            });
            previous = Some(&stored.data);
        }
        rows
    }

    pub fn visible_keys(&self) -> Vec<RowKey> {
        self.shown().map(|stored| self.store.key_of(stored)).collect()
    }

    pub fn visible_len(&self) -> usize {
        self.shown().count()
    }

    fn shown(&self) -> impl Iterator<Item = &StoredRow> + '_ {
        self.order
            .iter()
            .filter(|token| !self.filtered.contains(token) && !self.searched_out.contains(token))
            .filter_map(|token| self.index.get(token).and_then(|&i| self.store.entries().get(i)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Export and forms
    // ═══════════════════════════════════════════════════════════════════════

    /// CSV of the rows; `obey_view` limits it to visible columns and rows
    /// not excluded by filters, in display order
    pub fn export(&self, options: &ExportOptions) -> Result<CsvExport> {
        let content = if options.obey_view {
            let fields = self.visible_fields();
            let rows = self
                .order
                .iter()
                .filter(|token| !self.filtered.contains(token))
                .filter_map(|token| self.index.get(token).and_then(|&i| self.store.entries().get(i)))
                .map(|stored| &stored.data);
            export::export_csv(&fields, rows, options)?
        } else {
            let fields: Vec<&FieldDescriptor> = self.fields.iter().collect();
            export::export_csv(&fields, self.store.get_all(), options)?
        };

        Ok(CsvExport {
            filename: options
                .filename
                .clone()
                .unwrap_or_else(|| format!("{}.csv", self.config.id)),
            mime_type: CSV_MIME_TYPE,
            content,
        })
    }

    /// Describe the form for a row in `mode`; `Create` takes no row
    pub fn form(&self, key: Option<&RowKey>, mode: FormMode) -> Result<Vec<FormField>> {
        let row = if mode.needs_row() {
            Some(self.require_row(key)?)
        } else {
            None
        };
        Ok(form::form_for(&self.fields, row, mode))
    }

    /// Apply a submitted form and fire the matching row action
    ///
    /// Returns the key of the created or updated row.
    pub fn submit_form(
        &mut self,
        key: Option<&RowKey>,
        mode: FormMode,
        form: &[FormField],
    ) -> Result<Option<RowKey>> {
        match mode {
            FormMode::View => Ok(None),
            FormMode::Create | FormMode::Duplicate => {
                let row = form::form_values(form);
                if let Some(id) = self.store.id_of(&row) {
                    if self.store.get(&id).is_some() {
                        return Err(GridError::DuplicateIdentifier(id));
                    }
                }
                let key = self.add_entry(row);
                let action = if mode == FormMode::Create {
                    RowAction::Create
                } else {
                    RowAction::Duplicate
                };
                self.fire(action, &key);
                Ok(Some(key))
            }
            FormMode::Edit => {
                self.require_row(key)?;
                let Some(key) = key.cloned() else {
                    return Ok(None);
                };
                let key = self.store.merge(&key, form::form_values(form)).unwrap_or(key);
                self.refresh();
                self.fire(RowAction::Update, &key);
                Ok(Some(key))
            }
            FormMode::Delete => {
                self.require_row(key)?;
                let Some(key) = key.cloned() else {
                    return Ok(None);
                };
                self.fire(RowAction::Delete, &key);
                self.delete_entry(&key)?;
                Ok(None)
            }
        }
    }

    fn require_row(&self, key: Option<&RowKey>) -> Result<&Row> {
        let key = key.ok_or_else(|| GridError::RowNotFound("no row given".to_string()))?;
        self.store
            .get_by_key(key)
            .ok_or_else(|| GridError::RowNotFound(key.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════════════════

    /// Snapshot of the user-configured view state
    ///
    /// Only identifier-keyed selections are kept; generated row tokens do not
    /// survive a reload.
    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            version: STATE_VERSION,
            columns: self.fields.iter().map(|f| (f.name.clone(), f.hidden)).collect(),
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            selected: self
                .selection
                .primary()
                .filter(|key| matches!(key, RowKey::Id(_)))
                .cloned(),
        }
    }

    pub fn clear_persisted_state(&mut self) {
        if let Some(store) = self.persistence.as_mut() {
            store.clear(&self.state_key);
        }
    }

    fn persist(&mut self) {
        let state = self.persisted_state();
        if let Some(store) = self.persistence.as_mut() {
            store.save(&self.state_key, &state);
        }
    }

    /// Re-apply stored columns, filters and sort; entries that no longer fit
    /// the field list are dropped
    fn apply_state(&mut self, state: PersistedState) {
        for (name, hidden) in &state.columns {
            if let Some(field) = self.fields.iter_mut().find(|f| &f.name == name) {
                field.hidden = *hidden;
            }
        }
        for predicate in state.filters {
            match self.check_filter(&predicate) {
                Ok(()) => self.filters.push(predicate),
                Err(e) => tracing::warn!(grid = %self.config.id, error = %e, "dropping stored filter"),
            }
        }
        if let Some(sort) = state.sort {
            match self.check_sort(&sort.field) {
                Ok(_) => self.sort = Some(sort),
                Err(e) => tracing::warn!(grid = %self.config.id, error = %e, "dropping stored sort"),
            }
        }
        self.pending_selection = state.selected;
        tracing::debug!(grid = %self.config.id, "restored view state");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Derived view state
    // ═══════════════════════════════════════════════════════════════════════

    fn refresh(&mut self) {
        self.sync_order();
        self.sort_order();
        self.recompute_filtered();
        self.recompute_search();
        self.update_notices();
    }

    /// Drop removed rows from the display order and append new ones
    fn sync_order(&mut self) {
        self.index = self
            .store
            .entries()
            .iter()
            .enumerate()
            .map(|(i, stored)| (stored.token, i))
            .collect();

        let index = &self.index;
        self.order.retain(|token| index.contains_key(token));
        let known: HashSet<u64> = self.order.iter().copied().collect();
        for stored in self.store.entries() {
            if !known.contains(&stored.token) {
                self.order.push(stored.token);
            }
        }
    }

    /// Stable re-sort of the current display order
    fn sort_order(&mut self) {
        let entries = self.store.entries();
        let mut keyed: Vec<(u64, &Row)> = self
            .order
            .iter()
            .filter_map(|token| self.index.get(token).map(|&i| (*token, &entries[i].data)))
            .collect();

        if let Some(sort) = &self.sort {
            let Some(field) = field::find(&self.fields, &sort.field) else {
                return;
            };
            keyed.sort_by(|a, b| sort::compare(a.1, b.1, field, sort.direction));
        } else if let Some(comparator) = &self.comparator {
            keyed.sort_by(|a, b| comparator(a.1, b.1));
        } else {
            return;
        }

        self.order = keyed.into_iter().map(|(token, _)| token).collect();
    }

    fn recompute_filtered(&mut self) {
        self.filtered = self
            .store
            .entries()
            .iter()
            .filter(|stored| !filter::apply_all(&self.filters, &stored.data, &self.fields))
            .map(|stored| stored.token)
            .collect();
    }

    fn recompute_search(&mut self) {
        self.searched_out.clear();
        self.hidden_matches = 0;
        if self.search_query.trim().is_empty() {
            return;
        }
        for stored in self.store.entries() {
            let outcome = search::search(&self.search_query, &stored.data, &self.fields);
            if outcome.matched {
                continue;
            }
            self.searched_out.insert(stored.token);
            if outcome.matched_in_hidden_column && !self.filtered.contains(&stored.token) {
                self.hidden_matches += 1;
            }
        }
    }

    fn update_notices(&mut self) {
        let mut notices = Vec::new();
        if !self.fields.is_empty() && self.fields.iter().all(|f| f.hidden) {
            notices.push(GridNotice::NoVisibleColumns);
        }
        if !self.store.is_empty() {
            if self.filtered.len() == self.store.len() {
                if !self.filters.is_empty() {
                    notices.push(GridNotice::NoMatchingRows);
                }
            } else if self.visible_len() == 0 {
                notices.push(if self.hidden_matches > 0 {
                    GridNotice::SearchMatchesHidden
                } else {
                    GridNotice::NoSearchResults
                });
            }
        }
        if notices != self.notices {
            tracing::debug!(grid = %self.config.id, ?notices, "notices changed");
        }
        self.notices = notices;
    }

    fn forget_missing_selection(&mut self) {
        let store = &self.store;
        self.selection.retain(|key| store.position(key).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::export::HeaderMode;
    use crate::model::field::FieldType;
    use crate::model::persistence::FileStorage;
    use crate::model::value;
    use crate::services::source::rows_from_response;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rows(v: Value) -> Vec<Row> {
        rows_from_response(v).unwrap()
    }

    fn people_config() -> GridConfig {
        GridConfig::new(
            "people",
            vec![
                FieldDescriptor::new("name", FieldType::String).with_label("Name"),
                FieldDescriptor::new("age", FieldType::Number).with_label("Age"),
            ],
        )
        .with_identifier("id")
    }

    fn people() -> Vec<Row> {
        rows(json!([
            {"id": 1, "name": "Bo", "age": 30},
            {"id": 2, "name": "Al", "age": 25}
        ]))
    }

    fn loaded(config: GridConfig, persistence: Option<PersistenceStore>, data: Vec<Row>) -> GridController {
        let mut grid = GridController::new(config, persistence).unwrap();
        grid.load(DataSource::Rows(data)).unwrap();
        grid
    }

    fn names(grid: &GridController) -> Vec<String> {
        grid.visible_rows()
            .iter()
            .map(|r| value::text(r.row.get("name")))
            .collect()
    }

    fn id(s: &str) -> RowKey {
        RowKey::Id(s.to_string())
    }

    #[test]
    fn test_end_to_end_sort_then_filter() {
        let mut grid = GridController::new(people_config(), None).unwrap();
        assert_eq!(grid.lifecycle(), GridLifecycle::Uninitialized);

        grid.load(DataSource::Rows(people())).unwrap();
        assert_eq!(grid.lifecycle(), GridLifecycle::Ready);
        assert_eq!(names(&grid), vec!["Bo", "Al"]);

        grid.sort_field("age", SortDirection::Asc).unwrap();
        assert_eq!(names(&grid), vec!["Al", "Bo"]);

        grid.add_filter(FilterPredicate::new("age", Comparator::IsGreaterThan, 26))
            .unwrap();
        assert_eq!(names(&grid), vec!["Bo"]);
        assert!(grid.is_filtered(&id("2")));
        assert!(!grid.is_filtered(&id("1")));
        assert_eq!(grid.get_all().len(), 2);
        assert_eq!(grid.filter_tags(), vec!["Age is greater than 26"]);
    }

    #[test]
    fn test_toggle_sort_flips_direction() {
        let mut grid = loaded(people_config(), None, people());
        assert_eq!(grid.toggle_sort("name").unwrap(), SortDirection::Asc);
        assert_eq!(names(&grid), vec!["Al", "Bo"]);
        assert_eq!(grid.toggle_sort("name").unwrap(), SortDirection::Desc);
        assert_eq!(names(&grid), vec!["Bo", "Al"]);
        assert_eq!(grid.toggle_sort("age").unwrap(), SortDirection::Asc);
        assert!(matches!(grid.toggle_sort("height"), Err(GridError::UnknownField(_))));
    }

    #[test]
    fn test_invalid_filters_are_rejected() {
        let mut grid = loaded(people_config(), None, people());
        assert!(matches!(
            grid.add_filter(FilterPredicate::new("age", Comparator::Contains, "3")),
            Err(GridError::InvalidComparator { .. })
        ));
        assert!(matches!(
            grid.add_filter(FilterPredicate::new("height", Comparator::Equals, 1)),
            Err(GridError::UnknownField(_))
        ));
        assert!(matches!(
            grid.add_filter_input("age", Comparator::Equals, "thirty"),
            Err(GridError::InvalidFilterValue { .. })
        ));
        assert!(grid.filters().is_empty());
        assert_eq!(grid.visible_len(), 2);
    }

    #[test]
    fn test_remove_and_clear_filters() {
        let mut grid = loaded(people_config(), None, people());
        grid.add_filter_input("age", Comparator::IsLessThan, "28").unwrap();
        grid.add_filter_input("name", Comparator::StartsWith, "b").unwrap();
        assert_eq!(grid.visible_len(), 0);
        assert_eq!(grid.notices(), &[GridNotice::NoMatchingRows]);

        let removed = grid.remove_filter(1).unwrap();
        assert_eq!(removed.field, "name");
        assert_eq!(names(&grid), vec!["Al"]);
        assert!(grid.remove_filter(5).is_none());

        grid.clear_filters();
        assert_eq!(grid.visible_len(), 2);
        assert!(grid.notices().is_empty());
    }

    #[test]
    fn test_update_merges_and_replace_clears() {
        let mut grid = loaded(people_config(), None, people());
        grid.update(rows(json!([{"id": 2, "age": 26}, {"id": 3, "name": "Cy", "age": 40}])));

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.get("2").unwrap()["name"], json!("Al"));
        assert_eq!(grid.get("2").unwrap()["age"], json!(26));

        grid.replace(rows(json!([{"id": 9, "name": "Di", "age": 50}])));
        assert_eq!(names(&grid), vec!["Di"]);
    }

    #[test]
    fn test_new_rows_follow_active_sort() {
        let mut grid = loaded(people_config(), None, people());
        grid.sort_field("age", SortDirection::Desc).unwrap();
        grid.add_entry(rows(json!([{"id": 3, "name": "Cy", "age": 27}])).remove(0));
        assert_eq!(names(&grid), vec!["Bo", "Cy", "Al"]);
    }

    #[test]
    fn test_entry_operations() {
        let mut grid = loaded(people_config(), None, people());
        grid.select(&id("1"), Modifiers::NONE);

        let key = grid
            .update_entry(rows(json!([{"id": 1, "age": 31}])).remove(0))
            .unwrap();
        assert_eq!(key, id("1"));
        assert_eq!(grid.get("1").unwrap()["age"], json!(31));
        assert!(matches!(
            grid.update_entry(rows(json!([{"id": 7, "age": 1}])).remove(0)),
            Err(GridError::RowNotFound(_))
        ));

        grid.delete_entry(&id("1")).unwrap();
        assert!(grid.selection().selected().is_empty());
        assert_eq!(names(&grid), vec!["Al"]);
        assert!(grid.delete_by_identifier("1").is_none());
    }

    #[test]
    fn test_failed_load_keeps_last_good_rows() {
        let mut grid = loaded(people_config(), None, people());
        let result = grid.load(DataSource::response("<html>oops</html>"));

        assert!(matches!(result, Err(GridError::MalformedResponse(_))));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.lifecycle(), GridLifecycle::Ready);

        let mut fresh = GridController::new(people_config(), None).unwrap();
        assert!(fresh.load(DataSource::response("{}")).is_err());
        assert_eq!(fresh.lifecycle(), GridLifecycle::Uninitialized);
    }

    #[test]
    fn test_fields_are_inferred_when_not_configured() {
        let grid = loaded(GridConfig::new("inferred", Vec::new()), None, people());
        let names: Vec<&str> = grid.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["age", "id", "name"]);
        assert_eq!(grid.config().identifier.as_deref(), Some("id"));
        assert!(grid.get("2").is_some());
    }

    #[test]
    fn test_duplicate_cells_are_flagged() {
        let mut config = GridConfig::new(
            "teams",
            vec![
                FieldDescriptor::new("team", FieldType::String),
                FieldDescriptor::new("city", FieldType::String).nodupe(),
                FieldDescriptor::new("name", FieldType::String),
            ],
        );
        config.identifier = Some("name".to_string());
        let grid = loaded(
            config,
            None,
            rows(json!([
                {"team": "Red", "city": "Oslo", "name": "Bo"},
                {"team": "Red", "city": "Oslo", "name": "Al"},
                {"team": "Blue", "city": "Oslo", "name": "Cy"},
                {"team": "Blue", "name": "Di"},
                {"team": "Blue", "name": "Ed"}
            ])),
        );

        let flags: Vec<Vec<String>> = grid.visible_rows().into_iter().map(|r| r.duplicates).collect();
        assert_eq!(
            flags,
            vec![
                Vec::<String>::new(),
                vec!["team".to_string()],
                vec![],
                vec!["team".to_string()],
                vec!["team".to_string()],
            ]
        );
    }

    #[test]
    fn test_search_and_notices() {
        let mut config = people_config();
        config.fields.push(FieldDescriptor::new("email", FieldType::Email).hidden());
        let mut grid = loaded(
            config,
            None,
            rows(json!([
                {"id": 1, "name": "Bo", "age": 30, "email": "bo@example.com"},
                {"id": 2, "name": "Al", "age": 25}
            ])),
        );

        grid.search("AL");
        assert_eq!(names(&grid), vec!["Al"]);
        assert!(grid.notices().is_empty());

        grid.search("example");
        assert_eq!(grid.visible_len(), 0);
        assert_eq!(grid.notices(), &[GridNotice::SearchMatchesHidden]);

        grid.search("zzz");
        assert_eq!(grid.notices(), &[GridNotice::NoSearchResults]);

        grid.toggle_column("email").unwrap();
        grid.search("example");
        assert_eq!(names(&grid), vec!["Bo"]);

        grid.search("");
        assert_eq!(grid.visible_len(), 2);
    }

    #[test]
    fn test_hiding_every_column_warns() {
        let mut grid = loaded(people_config(), None, people());
        assert!(grid.toggle_column("name").unwrap());
        assert!(grid.notices().is_empty());
        grid.set_column_hidden("age", true).unwrap();
        assert_eq!(grid.notices(), &[GridNotice::NoVisibleColumns]);
        assert!(!grid.toggle_column("age").unwrap());
        assert!(grid.notices().is_empty());
        assert!(grid.toggle_column("height").is_err());
    }

    #[test]
    fn test_export_obeys_view() {
        let mut grid = loaded(people_config(), None, people());
        grid.sort_field("age", SortDirection::Asc).unwrap();
        grid.add_filter(FilterPredicate::new("age", Comparator::IsLessThan, 28))
            .unwrap();
        grid.toggle_column("age").unwrap();

        let view = grid.export(&ExportOptions::default()).unwrap();
        assert_eq!(view.filename, "people.csv");
        assert_eq!(view.mime_type, "text/csv");
        assert_eq!(view.content, "\"Name\"\r\n\"Al\"\r\n");

        let full = grid
            .export(&ExportOptions {
                obey_view: false,
                header: HeaderMode::Names,
                filename: Some("all.csv".to_string()),
                ..ExportOptions::default()
            })
            .unwrap();
        assert_eq!(full.filename, "all.csv");
        assert_eq!(full.content, "\"name\",\"age\"\r\n\"Bo\",\"30\"\r\n\"Al\",\"25\"\r\n");
    }

    #[test]
    fn test_shift_select_uses_display_order() {
        let config = people_config().with_multi_select(false);
        let mut grid = loaded(
            config,
            None,
            rows(json!([
                {"id": "a", "name": "A", "age": 5},
                {"id": "b", "name": "B", "age": 1},
                {"id": "c", "name": "C", "age": 4},
                {"id": "d", "name": "D", "age": 2}
            ])),
        );
        grid.sort_field("age", SortDirection::Asc).unwrap();
        // Display order: b, d, c, a
        grid.select(&id("d"), Modifiers::NONE);
        let change = grid.select(&id("a"), Modifiers::SHIFT);
        assert_eq!(change.selected, vec![id("c"), id("a")]);

        let change = grid.deselect_all();
        assert_eq!(change.deselected.len(), 3);
    }

    #[test]
    fn test_callbacks_receive_row_and_grid() {
        let mut grid = loaded(people_config().with_multi_select(true), None, people());
        let log = Rc::new(RefCell::new(Vec::new()));

        for action in [RowAction::Select, RowAction::Deselect, RowAction::Activate, RowAction::MouseOver] {
            let log = Rc::clone(&log);
            grid.on(action, move |row, grid| {
                log.borrow_mut().push(format!(
                    "{:?} {} of {}",
                    action,
                    value::text(row.get("name")),
                    grid.len()
                ));
            });
        }

        grid.select(&id("1"), Modifiers::NONE);
        grid.select(&id("1"), Modifiers::NONE);
        grid.double_click(&id("2"));
        grid.hover(&id("2"));
        grid.hover_out(&id("2"));
        grid.hover(&id("missing"));

        assert_eq!(
            *log.borrow(),
            vec![
                "Select Bo of 2",
                "Deselect Bo of 2",
                "Activate Al of 2",
                "MouseOver Al of 2",
            ]
        );
    }

    #[test]
    fn test_toggle_all_selects_visible_rows() {
        let mut grid = loaded(people_config().with_multi_select(true), None, people());
        grid.add_filter(FilterPredicate::new("age", Comparator::IsGreaterThan, 26))
            .unwrap();
        let change = grid.toggle_all_select(true);
        assert_eq!(change.selected, vec![id("1")]);
        assert_eq!(grid.selected_rows().len(), 1);
        grid.toggle_all_select(false);
        assert!(grid.selected_rows().is_empty());
    }

    #[test]
    fn test_form_submission() {
        let mut grid = loaded(people_config(), None, people());
        let created = Rc::new(RefCell::new(0));
        {
            let created = Rc::clone(&created);
            grid.on(RowAction::Create, move |_, _| *created.borrow_mut() += 1);
        }

        let view = grid.form(Some(&id("1")), FormMode::View).unwrap();
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|f| f.readonly));
        assert!(grid.form(None, FormMode::Edit).is_err());

        let mut edit = grid.form(Some(&id("2")), FormMode::Edit).unwrap();
        edit[1].value = json!(26);
        assert_eq!(grid.submit_form(Some(&id("2")), FormMode::Edit, &edit).unwrap(), Some(id("2")));
        assert_eq!(grid.get("2").unwrap()["age"], json!(26));

        let mut create = grid.form(None, FormMode::Create).unwrap();
        create[0].value = json!("Cy");
        let key = grid.submit_form(None, FormMode::Create, &create).unwrap().unwrap();
        assert!(matches!(key, RowKey::Token(_)));
        assert_eq!(grid.len(), 3);
        assert_eq!(*created.borrow(), 1);

        let delete = grid.form(Some(&id("1")), FormMode::Delete).unwrap();
        assert_eq!(grid.submit_form(Some(&id("1")), FormMode::Delete, &delete).unwrap(), None);
        assert_eq!(grid.len(), 2);
        assert!(grid.get("1").is_none());
    }

    #[test]
    fn test_create_rejects_existing_identifier() {
        let config = GridConfig::new(
            "people",
            vec![
                FieldDescriptor::new("id", FieldType::Number),
                FieldDescriptor::new("name", FieldType::String),
            ],
        )
        .with_identifier("id");
        let mut grid = loaded(config, None, rows(json!([{"id": 1, "name": "Bo"}, {"id": 2, "name": "Al"}])));
        let fired = Rc::new(RefCell::new(0));
        for action in [RowAction::Create, RowAction::Duplicate] {
            let fired = Rc::clone(&fired);
            grid.on(action, move |_, _| *fired.borrow_mut() += 1);
        }

        let mut create = grid.form(None, FormMode::Create).unwrap();
        create[0].value = json!(1);
        create[1].value = json!("Zed");
        let err = grid.submit_form(None, FormMode::Create, &create).unwrap_err();
        assert!(matches!(err, GridError::DuplicateIdentifier(ref taken) if taken == "1"));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.get("1").unwrap()["name"], json!("Bo"));

        let mut copy = grid.form(Some(&id("2")), FormMode::Duplicate).unwrap();
        copy[0].value = json!(2);
        assert!(grid.submit_form(Some(&id("2")), FormMode::Duplicate, &copy).is_err());
        copy[0].value = json!(3);
        assert_eq!(
            grid.submit_form(Some(&id("2")), FormMode::Duplicate, &copy).unwrap(),
            Some(id("3"))
        );
        assert_eq!(grid.len(), 3);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_large_load_keeps_identifier_lookups() {
        let data: Vec<Row> = (0..3000)
            .map(|i| value::row_from_value(json!({"id": i, "name": format!("n{}", i), "age": i % 90})).unwrap())
            .collect();
        let mut grid = loaded(people_config(), None, data);
        assert_eq!(grid.len(), 3000);
        assert_eq!(grid.get("2999").unwrap()["name"], json!("n2999"));

        grid.update(rows(json!([{"id": 1500, "age": 99}])));
        assert_eq!(grid.len(), 3000);
        assert_eq!(grid.get("1500").unwrap()["age"], json!(99));

        assert!(grid.delete_by_identifier("0").is_some());
        assert_eq!(grid.get("1").unwrap()["name"], json!("n1"));
        assert_eq!(grid.visible_len(), 2999);
    }

    #[test]
    fn test_restored_selection_fires_select() {
        let mut persistence = PersistenceStore::in_memory("test");
        let key = persistence.key_for("people");
        let state = PersistedState {
            selected: Some(id("2")),
            ..PersistedState::default()
        };
        persistence.save(&key, &state);

        let mut grid = GridController::new(people_config(), Some(persistence)).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            grid.on(RowAction::Select, move |row, grid| {
                log.borrow_mut().push((value::text(row.get("name")), grid.lifecycle()));
            });
        }
        grid.load(DataSource::Rows(people())).unwrap();

        assert!(grid.is_selected(&id("2")));
        assert_eq!(*log.borrow(), vec![("Al".to_string(), GridLifecycle::Ready)]);
    }

    #[test]
    fn test_missing_state_falls_back_to_defaults() {
        let config = people_config().with_default_sort(SortState::new("age", SortDirection::Desc));
        let persistence = PersistenceStore::in_memory("test");
        let grid = loaded(config, Some(persistence), people());

        assert_eq!(grid.sort_state(), Some(&SortState::new("age", SortDirection::Desc)));
        assert!(grid.fields().iter().all(|f| !f.hidden));
        assert!(grid.filters().is_empty());
        assert_eq!(names(&grid), vec!["Bo", "Al"]);
    }

    #[test]
    fn test_view_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = || PersistenceStore::new(Box::new(FileStorage::new(dir.path())), "test");

        {
            let mut grid = loaded(people_config(), Some(store()), people());
            grid.toggle_column("age").unwrap();
            grid.add_filter(FilterPredicate::new("age", Comparator::IsGreaterThan, 20))
                .unwrap();
            grid.sort_field("name", SortDirection::Asc).unwrap();
            grid.select(&id("1"), Modifiers::NONE);
        }

        let mut grid = GridController::new(people_config(), Some(store())).unwrap();
        assert!(grid.field("age").unwrap().hidden);
        assert_eq!(grid.filters().len(), 1);
        assert_eq!(grid.sort_state(), Some(&SortState::new("name", SortDirection::Asc)));

        grid.load(DataSource::Rows(people())).unwrap();
        assert_eq!(names(&grid), vec!["Al", "Bo"]);
        assert!(grid.is_selected(&id("1")));

        grid.clear_persisted_state();
        let grid = GridController::new(people_config(), Some(store())).unwrap();
        assert!(grid.sort_state().is_none());
    }

    #[test]
    fn test_stale_state_entries_are_dropped() {
        let mut persistence = PersistenceStore::in_memory("test");
        let key = persistence.key_for("people");
        let mut state = PersistedState::default();
        state.filters.push(FilterPredicate::new("height", Comparator::Equals, 1));
        state.filters.push(FilterPredicate::new("age", Comparator::IsGreaterThan, 26));
        state.sort = Some(SortState::new("height", SortDirection::Asc));
        persistence.save(&key, &state);

        let grid = GridController::new(people_config(), Some(persistence)).unwrap();
        assert_eq!(grid.filters().len(), 1);
        assert!(grid.sort_state().is_none());
    }
}
