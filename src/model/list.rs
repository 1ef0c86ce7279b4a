//! List-shaped variant of the grid
//!
//! A [`DataList`] shows one line per row. It has no filters and no column
//! configuration; instead it takes a comparator for ordering and an optional
//! callback that draws each item.

use std::cmp::Ordering;

use crate::config::GridConfig;
use crate::error::Result;
use crate::model::export::{CsvExport, ExportOptions};
use crate::model::grid::{GridController, RowAction};
use crate::model::persistence::PersistenceStore;
use crate::model::row_store::RowKey;
use crate::model::selection::{Modifiers, SelectionChange};
use crate::model::sort::SortDirection;
use crate::model::value::Row;
use crate::services::source::DataSource;

pub type ItemRenderer = Box<dyn Fn(&Row) -> String>;

const ITEM_SEPARATOR: &str = " · ";

/// One drawn list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub key: RowKey,
    pub text: String,
    pub selected: bool,
}

pub struct DataList {
    grid: GridController,
    draw_item: Option<ItemRenderer>,
}

impl DataList {
    pub fn new(config: GridConfig, persistence: Option<PersistenceStore>) -> Result<Self> {
        let mut grid = GridController::new(config, persistence)?;
        grid.discard_filters();
        Ok(Self {
            grid,
            draw_item: None,
        })
    }

    /// The underlying controller, for read access
    pub fn grid(&self) -> &GridController {
        &self.grid
    }

    pub fn load(&mut self, source: DataSource) -> Result<()> {
        self.grid.load(source)
    }

    pub fn update(&mut self, rows: Vec<Row>) {
        self.grid.update(rows);
    }

    pub fn replace(&mut self, rows: Vec<Row>) {
        self.grid.replace(rows);
    }

    pub fn add_entry(&mut self, row: Row) -> RowKey {
        self.grid.add_entry(row)
    }

    pub fn delete_entry(&mut self, key: &RowKey) -> Result<Row> {
        self.grid.delete_entry(key)
    }

    pub fn search(&mut self, query: &str) {
        self.grid.search(query);
    }

    pub fn select(&mut self, key: &RowKey, modifiers: Modifiers) -> SelectionChange {
        self.grid.select(key, modifiers)
    }

    pub fn double_click(&mut self, key: &RowKey) {
        self.grid.double_click(key);
    }

    pub fn on(&mut self, action: RowAction, callback: impl FnMut(&Row, &GridController) + 'static) {
        self.grid.on(action, callback);
    }

    pub fn sort_field(&mut self, field: &str, direction: SortDirection) -> Result<()> {
        self.grid.sort_field(field, direction)
    }

    /// Order items with `comparator`; the sort is stable
    pub fn sort_with(&mut self, comparator: impl Fn(&Row, &Row) -> Ordering + 'static) {
        self.grid.sort_with(Box::new(comparator));
    }

    pub fn set_draw_item(&mut self, draw: impl Fn(&Row) -> String + 'static) {
        self.draw_item = Some(Box::new(draw));
    }

    /// Text of one item; without a draw callback, the visible cells joined
    pub fn draw(&self, row: &Row) -> String {
        match &self.draw_item {
            Some(draw) => draw(row),
            None => self
                .grid
                .visible_fields()
                .iter()
                .map(|f| f.render_cell(row))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(ITEM_SEPARATOR),
        }
    }

    pub fn items(&self) -> Vec<ListItem> {
        self.grid
            .visible_rows()
            .into_iter()
            .map(|view| ListItem {
                text: self.draw(view.row),
                key: view.key,
                selected: view.selected,
            })
            .collect()
    }

    pub fn export(&self, options: &ExportOptions) -> Result<CsvExport> {
        self.grid.export(options)
    }
}
