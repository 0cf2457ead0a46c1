//! Undoable-command facility, at its interface boundary.
//!
//! The host provides atomic, reversible "update these properties" operations;
//! this is the in-memory reference implementation the engine is written
//! against. Every mutating engine operation runs inside exactly one `execute`
//! call: the edit closure works on a private copy, and only a fully successful
//! closure is committed, so a half-applied edit is never observable.

use crate::error::Result;
use crate::model::BusinessObject;
use tracing::debug;

/// One committed, reversible edit.
#[derive(Debug, Clone)]
struct UndoableEdit {
    label: String,
    before: BusinessObject,
    after: BusinessObject,
}

#[derive(Debug, Default)]
pub struct CommandStack {
    undo: Vec<UndoableEdit>,
    redo: Vec<UndoableEdit>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `edit` against `element` as one atomic unit of work. On error the
    /// element is left byte-for-byte unchanged and nothing is recorded.
    pub fn execute<F>(&mut self, label: &str, element: &mut BusinessObject, edit: F) -> Result<()>
    where
        F: FnOnce(&mut BusinessObject) -> Result<()>,
    {
        let mut working = element.clone();
        edit(&mut working)?;

        if working == *element {
            // No-op edits do not pollute the undo history.
            return Ok(());
        }

        debug!(label, element = %element.element_type, "command committed");
        self.undo.push(UndoableEdit {
            label: label.to_string(),
            before: element.clone(),
            after: working.clone(),
        });
        self.redo.clear();
        *element = working;
        Ok(())
    }

    /// Revert the most recent edit. Returns false when the history is empty.
    pub fn undo(&mut self, element: &mut BusinessObject) -> bool {
        match self.undo.pop() {
            Some(edit) => {
                *element = edit.before.clone();
                self.redo.push(edit);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, element: &mut BusinessObject) -> bool {
        match self.redo.pop() {
            Some(edit) => {
                *element = edit.after.clone();
                self.undo.push(edit);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Label of the edit `undo` would revert, for host menus.
    pub fn peek_undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }
}
