//! Snapshot undo/redo.
//!
//! A checkpoint is a deep clone of the whole document plus the id of the
//! open group or element. The top of the undo stack is always the current
//! state, so a freshly loaded document starts with one baseline checkpoint
//! and `undo` needs at least two entries.

use tracing::debug;

use crate::model::{Document, ElementId};

/// One unit of undo: the full document and the focus to restore.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub document: Document,
    pub focus: ElementId,
}

/// Linear, unbounded undo/redo stack. No branching history: pushing a new
/// checkpoint discards everything on the redo side.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Checkpoint>,
    redo: Vec<Checkpoint>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears both stacks and records `document` as the baseline.
    pub fn reset(&mut self, document: &Document, focus: ElementId) {
        self.undo.clear();
        self.redo.clear();
        self.undo.push(Checkpoint {
            document: document.clone(),
            focus,
        });
    }

    /// Records the state after a successful command. Clears the redo stack.
    pub fn checkpoint(&mut self, document: &Document, focus: ElementId) {
        self.redo.clear();
        self.undo.push(Checkpoint {
            document: document.clone(),
            focus,
        });
        debug!(depth = self.undo.len(), "checkpoint");
    }

    pub fn can_undo(&self) -> bool {
        self.undo.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Steps back one checkpoint and returns the state to restore, or
    /// `None` at the baseline.
    pub fn undo(&mut self) -> Option<Checkpoint> {
        if !self.can_undo() {
            return None;
        }
        let current = self.undo.pop()?;
        self.redo.push(current);
        self.undo.last().cloned()
    }

    /// Re-applies the most recently undone checkpoint.
    pub fn redo(&mut self) -> Option<Checkpoint> {
        let next = self.redo.pop()?;
        self.undo.push(next);
        self.undo.last().cloned()
    }

    /// Number of checkpoints on the undo side, baseline included.
    pub fn depth(&self) -> usize {
        self.undo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, ElementKind, PathData};
    use engravekit_core::Point;

    fn sample() -> Document {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.insert_child(
            root,
            None,
            Element::new(
                "p",
                ElementKind::Path(PathData::from_points(&[
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                ])),
            ),
        )
        .unwrap();
        doc
    }

    #[test]
    fn baseline_alone_cannot_undo() {
        let doc = Document::new();
        let mut history = History::new();
        history.reset(&doc, doc.root_id());
        assert!(!history.can_undo());
        assert!(history.undo().is_none());
    }

    #[test]
    fn undo_restores_previous_state_and_redo_reapplies() {
        let empty = Document::new();
        let mut history = History::new();
        history.reset(&empty, empty.root_id());

        let full = sample();
        history.checkpoint(&full, full.root_id());

        let restored = history.undo().unwrap();
        assert_eq!(restored.document.element_count(), 1);
        assert!(history.can_redo());

        let redone = history.redo().unwrap();
        assert_eq!(redone.document.element_count(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn new_checkpoint_clears_redo() {
        let empty = Document::new();
        let mut history = History::new();
        history.reset(&empty, empty.root_id());
        history.checkpoint(&sample(), empty.root_id());
        history.undo().unwrap();
        assert!(history.can_redo());
        history.checkpoint(&sample(), empty.root_id());
        assert!(!history.can_redo());
    }
}
