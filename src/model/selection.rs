//! Row selection with single, multi and shift-range semantics

use crate::model::row_store::RowKey;

/// Keyboard modifiers held during a selection click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true };
}

/// Rows whose selection state changed during one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionChange {
    pub selected: Vec<RowKey>,
    pub deselected: Vec<RowKey>,
}

impl SelectionChange {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.deselected.is_empty()
    }
}

/// Tracks the selected row set
///
/// Single-select and multi-select share the same set; the mode only decides
/// whether a plain click clears the other rows.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: Vec<RowKey>,
    last: Option<RowKey>,
    multi_select: bool,
    select_self: bool,
}

impl SelectionController {
    /// `select_self` allows clicking an already selected row to select it
    /// again instead of deselecting it
    pub fn new(multi_select: bool, select_self: bool) -> Self {
        Self {
            selected: Vec::new(),
            last: None,
            multi_select,
            select_self,
        }
    }

    pub fn multi_select(&self) -> bool {
        self.multi_select
    }

    pub fn selected(&self) -> &[RowKey] {
        &self.selected
    }

    pub fn is_selected(&self, key: &RowKey) -> bool {
        self.selected.contains(key)
    }

    /// Row most recently clicked
    pub fn last(&self) -> Option<&RowKey> {
        self.last.as_ref()
    }

    /// The row that stands for the selection: the last clicked row if it is
    /// still selected, else the earliest selected row
    pub fn primary(&self) -> Option<&RowKey> {
        self.last
            .as_ref()
            .filter(|key| self.is_selected(key))
            .or_else(|| self.selected.first())
    }

    /// Apply a click on `key`; `ordered` is the current display order
    pub fn select(
        &mut self,
        key: &RowKey,
        modifiers: Modifiers,
        ordered: &[RowKey],
    ) -> SelectionChange {
        if modifiers.shift && !self.selected.is_empty() {
            return self.select_range(key, ordered);
        }

        if self.multi_select {
            let change = self.toggle(key);
            self.last = Some(key.clone());
            return change;
        }

        if self.is_selected(key) && !self.select_self {
            self.selected.retain(|k| k != key);
            self.last = Some(key.clone());
            return SelectionChange {
                selected: Vec::new(),
                deselected: vec![key.clone()],
            };
        }

        let deselected: Vec<RowKey> = self.selected.drain(..).filter(|k| k != key).collect();
        self.selected.push(key.clone());
        self.last = Some(key.clone());
        SelectionChange {
            selected: vec![key.clone()],
            deselected,
        }
    }

    fn toggle(&mut self, key: &RowKey) -> SelectionChange {
        if self.is_selected(key) {
            self.selected.retain(|k| k != key);
            SelectionChange {
                selected: Vec::new(),
                deselected: vec![key.clone()],
            }
        } else {
            self.selected.push(key.clone());
            SelectionChange {
                selected: vec![key.clone()],
                deselected: Vec::new(),
            }
        }
    }

    /// Shift-click: add the contiguous run between `clicked` and a selected row
    ///
    /// One pass over `ordered`. Gathering starts at the first endpoint met,
    /// either the clicked row or a selected row. Meeting another selected row
    /// while gathering from a selected row restarts the run there, so the run
    /// always begins at the selected row closest above the clicked row. The
    /// pass ends when the opposite endpoint is reached.
    fn select_range(&mut self, clicked: &RowKey, ordered: &[RowKey]) -> SelectionChange {
        let mut run: Vec<&RowKey> = Vec::new();
        let mut gathering = false;
        let mut from_clicked = false;
        let mut complete = false;

        for key in ordered {
            if key == clicked {
                if gathering && !from_clicked {
                    run.push(key);
                    complete = true;
                    break;
                }
                gathering = true;
                from_clicked = true;
                run = vec![key];
            } else if self.is_selected(key) {
                if gathering && from_clicked {
                    run.push(key);
                    complete = true;
                    break;
                }
                gathering = true;
                from_clicked = false;
                run = vec![key];
            } else if gathering {
                run.push(key);
            }
        }

        if !complete {
            run = vec![clicked];
        }

        let added: Vec<RowKey> = run
            .into_iter()
            .filter(|key| !self.selected.contains(key))
            .cloned()
            .collect();
        self.selected.extend(added.iter().cloned());
        self.last = Some(clicked.clone());

        SelectionChange {
            selected: added,
            deselected: Vec::new(),
        }
    }

    pub fn deselect_all(&mut self) -> SelectionChange {
        self.last = None;
        SelectionChange {
            selected: Vec::new(),
            deselected: std::mem::take(&mut self.selected),
        }
    }

    /// Select or deselect every row in `visible`
    pub fn toggle_all_select(&mut self, select: bool, visible: &[RowKey]) -> SelectionChange {
        let mut change = SelectionChange::default();
        for key in visible {
            let is_selected = self.is_selected(key);
            if select && !is_selected {
                self.selected.push(key.clone());
                change.selected.push(key.clone());
            } else if !select && is_selected {
                self.selected.retain(|k| k != key);
                change.deselected.push(key.clone());
            }
        }
        change
    }

    /// Drop a row from the selection without reporting a change
    pub fn forget(&mut self, key: &RowKey) {
        self.selected.retain(|k| k != key);
        if self.last.as_ref() == Some(key) {
            self.last = None;
        }
    }

    /// Keep only rows for which `exists` holds
    pub fn retain(&mut self, exists: impl Fn(&RowKey) -> bool) {
        self.selected.retain(|k| exists(k));
        if self.last.as_ref().is_some_and(|k| !exists(k)) {
            self.last = None;
        }
    }
}
