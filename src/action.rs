//! Action enum - Unified message passing for the grid front end
//!
//! Actions represent all possible state changes in the application.
//! Components emit Actions in response to events, and the App processes them.

use datagrid::model::{Comparator, ExportOptions, FormMode};
use std::fmt;

/// All possible actions in the application
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ─────────────────────────────────────────────────────────────────────────
    // App Lifecycle
    // ─────────────────────────────────────────────────────────────────────────
    /// Periodic tick for time-based updates
    Tick,
    /// Terminal was resized
    Resize(u16, u16),
    /// Quit without confirmation
    ForceQuit,

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────
    NextRow,
    PrevRow,
    FirstRow,
    LastRow,
    PageDown,
    PageUp,
    NextColumn,
    PrevColumn,
    /// Pointer moved over the row at this visible position
    HoverRow(usize),

    // ─────────────────────────────────────────────────────────────────────────
    // Sort
    // ─────────────────────────────────────────────────────────────────────────
    /// Sort by the focused column, flipping direction if already sorted by it
    ToggleSort,

    // ─────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────
    EnterSearchMode,
    ExitSearchMode,
    SearchInput(char),
    SearchBackspace,
    ClearSearch,

    // ─────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────
    /// Select the row under the cursor
    SelectRow,
    /// Extend the selection from the last selected row to the cursor
    ExtendSelection,
    /// Select the row at a visible position, as a mouse click would
    ClickRow { index: usize, shift: bool },
    ToggleSelectAll,
    ClearSelection,
    /// Activate the row under the cursor (double click)
    ActivateRow,

    // ─────────────────────────────────────────────────────────────────────────
    // Modals
    // ─────────────────────────────────────────────────────────────────────────
    OpenQuitDialog,
    OpenHelp,
    OpenColumns,
    OpenFilter,
    OpenExport,
    OpenRecord(FormMode),
    CloseModal,
    ConfirmModal,
    ModalUp,
    ModalDown,

    // ─────────────────────────────────────────────────────────────────────────
    // Columns and Filters
    // ─────────────────────────────────────────────────────────────────────────
    ToggleColumn(String),
    AddFilter {
        field: String,
        comparator: Comparator,
        input: String,
    },
    RemoveLastFilter,
    ClearFilters,

    // ─────────────────────────────────────────────────────────────────────────
    // Data
    // ─────────────────────────────────────────────────────────────────────────
    ExportCsv(ExportOptions),
    Reload,
    /// Forget the stored view state and reload
    ResetView,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tick => write!(f, "Tick"),
            Action::Resize(w, h) => write!(f, "Resize({}, {})", w, h),
            Action::ForceQuit => write!(f, "ForceQuit"),
            Action::NextRow => write!(f, "NextRow"),
            Action::PrevRow => write!(f, "PrevRow"),
            Action::FirstRow => write!(f, "FirstRow"),
            Action::LastRow => write!(f, "LastRow"),
            Action::PageDown => write!(f, "PageDown"),
            Action::PageUp => write!(f, "PageUp"),
            Action::NextColumn => write!(f, "NextColumn"),
            Action::PrevColumn => write!(f, "PrevColumn"),
            Action::HoverRow(index) => write!(f, "HoverRow({})", index),
            Action::ToggleSort => write!(f, "ToggleSort"),
            Action::EnterSearchMode => write!(f, "EnterSearchMode"),
            Action::ExitSearchMode => write!(f, "ExitSearchMode"),
            Action::SearchInput(c) => write!(f, "SearchInput({})", c),
            Action::SearchBackspace => write!(f, "SearchBackspace"),
            Action::ClearSearch => write!(f, "ClearSearch"),
            Action::SelectRow => write!(f, "SelectRow"),
            Action::ExtendSelection => write!(f, "ExtendSelection"),
            Action::ClickRow { index, shift } => write!(f, "ClickRow({}, shift={})", index, shift),
            Action::ToggleSelectAll => write!(f, "ToggleSelectAll"),
            Action::ClearSelection => write!(f, "ClearSelection"),
            Action::ActivateRow => write!(f, "ActivateRow"),
            Action::OpenQuitDialog => write!(f, "OpenQuitDialog"),
            Action::OpenHelp => write!(f, "OpenHelp"),
            Action::OpenColumns => write!(f, "OpenColumns"),
            Action::OpenFilter => write!(f, "OpenFilter"),
            Action::OpenExport => write!(f, "OpenExport"),
            Action::OpenRecord(mode) => write!(f, "OpenRecord({})", mode.title()),
            Action::CloseModal => write!(f, "CloseModal"),
            Action::ConfirmModal => write!(f, "ConfirmModal"),
            Action::ModalUp => write!(f, "ModalUp"),
            Action::ModalDown => write!(f, "ModalDown"),
            Action::ToggleColumn(name) => write!(f, "ToggleColumn({})", name),
            Action::AddFilter {
                field,
                comparator,
                input,
            } => write!(f, "AddFilter({} {} {})", field, comparator, input),
            Action::RemoveLastFilter => write!(f, "RemoveLastFilter"),
            Action::ClearFilters => write!(f, "ClearFilters"),
            Action::ExportCsv(_) => write!(f, "ExportCsv"),
            Action::Reload => write!(f, "Reload"),
            Action::ResetView => write!(f, "ResetView"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_action_display() {
        assert_eq!(Action::ClickRow { index: 3, shift: true }.to_string(), "ClickRow(3, shift=true)");
        assert_eq!(Action::OpenRecord(FormMode::Edit).to_string(), "OpenRecord(Edit)");
        let add = Action::AddFilter {
            field: "age".to_string(),
            comparator: Comparator::IsGreaterThan,
            input: "30".to_string(),
        };
        assert_eq!(add.to_string(), "AddFilter(age isgreaterthan 30)");
    }
}
