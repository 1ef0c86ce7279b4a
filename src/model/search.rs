//! Free-text search over rendered cells

use crate::model::field::FieldDescriptor;
use crate::model::value::Row;

/// Result of searching one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchOutcome {
    /// The query occurs in a visible column
    pub matched: bool,
    /// The query occurs only in columns that are currently hidden
    pub matched_in_hidden_column: bool,
}

impl SearchOutcome {
    pub const ALL: SearchOutcome = SearchOutcome {
        matched: true,
        matched_in_hidden_column: false,
    };
}

/// Case-insensitive substring search across a row's rendered data cells
///
/// Visible columns are searched first and stop at the first hit. Hidden
/// columns are only consulted when no visible column matched, so callers can
/// tell "nothing matches" apart from "matches are hidden". An empty query
/// matches every row.
pub fn search(query: &str, row: &Row, fields: &[FieldDescriptor]) -> SearchOutcome {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return SearchOutcome::ALL;
    }

    let hit = |field: &FieldDescriptor| field.render_cell(row).to_lowercase().contains(&query);

    if fields.iter().filter(|f| !f.hidden).any(|f| hit(f)) {
        return SearchOutcome::ALL;
    }

    SearchOutcome {
        matched: false,
        matched_in_hidden_column: fields.iter().filter(|f| f.hidden).any(|f| hit(f)),
    }
}
