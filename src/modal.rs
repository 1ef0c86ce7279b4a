//! Modal stack for overlays drawn on top of the grid
//!
//! Only the top modal receives input.

use datagrid::model::FormMode;

#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    QuitConfirm,
    Help,
    /// Column visibility chooser
    Columns,
    /// Filter builder
    Filter,
    /// CSV export options
    Export,
    /// Record form for the row under the cursor (or a new row)
    Record(FormMode),
}

#[derive(Debug, Default)]
pub struct ModalStack {
    stack: Vec<Modal>,
}

impl ModalStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, modal: Modal) {
        self.stack.push(modal);
    }

    pub fn pop(&mut self) -> Option<Modal> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Modal> {
        self.stack.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Push `modal`, or pop it if it is already on top
    pub fn toggle(&mut self, modal: Modal) {
        if self.top() == Some(&modal) {
            self.stack.pop();
        } else {
            self.stack.push(modal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_modal_stack_push_pop() {
        let mut stack = ModalStack::new();
        assert!(stack.top().is_none());

        stack.push(Modal::Columns);
        stack.push(Modal::Record(FormMode::View));
        assert_eq!(stack.pop(), Some(Modal::Record(FormMode::View)));
        assert_eq!(stack.pop(), Some(Modal::Columns));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_modal_stack_toggle() {
        let mut stack = ModalStack::new();
        stack.toggle(Modal::Help);
        assert_eq!(stack.top(), Some(&Modal::Help));
        stack.toggle(Modal::Help);
        assert!(stack.is_empty());

        stack.push(Modal::Filter);
        stack.toggle(Modal::Help);
        assert_eq!(stack.top(), Some(&Modal::Help));
    }
}
