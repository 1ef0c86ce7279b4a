//! Grid model layer
//!
//! Leaf modules first:
//! - `value` / `field` - row values and column descriptors
//! - `row_store` - the authoritative row collection
//! - `sort`, `filter`, `search`, `selection` - view derivation over rows
//! - `export`, `persistence`, `form` - outward-facing contracts
//! - `grid`, `list` - the controllers that compose everything above

pub mod export;
pub mod field;
pub mod filter;
pub mod form;
pub mod grid;
pub mod list;
pub mod persistence;
pub mod row_store;
pub mod search;
pub mod selection;
pub mod sort;
pub mod value;

// Re-export commonly used types
pub use export::{CsvExport, ExportOptions, HeaderMode, QuoteEscape};
pub use field::{Comparator, FieldDescriptor, FieldType};
pub use filter::FilterPredicate;
pub use form::{FormField, FormMode};
pub use grid::{GridController, GridLifecycle, GridNotice, RowAction, ViewRow};
pub use list::{DataList, ListItem};
pub use persistence::{FileStorage, MemoryStorage, PersistedState, PersistenceStore, StateStorage};
pub use row_store::{RowKey, RowStore};
pub use selection::{Modifiers, SelectionChange, SelectionController};
pub use sort::{SortDirection, SortState};
pub use value::Row;
