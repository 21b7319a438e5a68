//! Focus and selection: which container is open for editing and what is
//! selected inside it.
//!
//! The controller is always in exactly one of two states. Browsing: a
//! group is open and whole child elements are selected. Point editing: a
//! single leaf is open and its point handles are selected. Closing an
//! editing level auto-prunes an emptied container; later commands rely on
//! that rule.

use std::collections::BTreeSet;

use tracing::debug;

use engravekit_core::{DesignError, Result};

use crate::model::{Document, ElementId, ExcludeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// `group` is open; selection is a set of its children.
    Browsing { group: ElementId },
    /// `element` is open; selection is a set of its point handles.
    PointEditing { element: ElementId },
}

#[derive(Debug)]
pub struct EditController {
    state: EditState,
    selected_elements: Vec<ElementId>,
    selected_points: BTreeSet<usize>,
}

impl EditController {
    pub fn new(root: ElementId) -> Self {
        Self {
            state: EditState::Browsing { group: root },
            selected_elements: Vec::new(),
            selected_points: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// Id of the open group or element, the focus stored in checkpoints.
    pub fn focus(&self) -> ElementId {
        match self.state {
            EditState::Browsing { group } => group,
            EditState::PointEditing { element } => element,
        }
    }

    /// The open group while browsing.
    pub fn edited_group(&self) -> Option<ElementId> {
        match self.state {
            EditState::Browsing { group } => Some(group),
            EditState::PointEditing { .. } => None,
        }
    }

    /// The open leaf while point editing.
    pub fn edited_element(&self) -> Option<ElementId> {
        match self.state {
            EditState::PointEditing { element } => Some(element),
            EditState::Browsing { .. } => None,
        }
    }

    /// Opens `id` for editing: groups enter browsing, leaves enter point
    /// editing. Selection is cleared either way.
    pub fn open(&mut self, document: &Document, id: ElementId) -> Result<()> {
        let element = document
            .find(id)
            .ok_or(DesignError::StaleFocus { id: id.raw() })?;
        self.state = if element.is_group() {
            EditState::Browsing { group: id }
        } else {
            EditState::PointEditing { element: id }
        };
        self.clear_selection();
        debug!(id = id.raw(), state = ?self.state, "open");
        Ok(())
    }

    /// Closes the current editing level, pruning it if it emptied out.
    ///
    /// From point editing: an emptied element is deleted and its parent
    /// becomes both the open group and the selection; otherwise the parent
    /// opens with the closed element selected. From browsing: an emptied
    /// group is deleted and its parent opens with nothing selected;
    /// otherwise the parent opens with the closed group selected. At the
    /// root this is a no-op.
    pub fn escape(&mut self, document: &mut Document) {
        match self.state {
            EditState::PointEditing { element } => {
                let parent = document
                    .find_parent_id(element)
                    .unwrap_or_else(|| document.root_id());
                let emptied = document.find(element).is_none_or(|e| e.is_empty());
                if emptied {
                    document.remove(element);
                    self.state = EditState::Browsing { group: parent };
                    self.clear_selection();
                    self.selected_elements.push(parent);
                } else {
                    self.state = EditState::Browsing { group: parent };
                    self.clear_selection();
                    self.selected_elements.push(element);
                }
            }
            EditState::Browsing { group } => {
                if group == document.root_id() {
                    return;
                }
                let parent = document
                    .find_parent_id(group)
                    .unwrap_or_else(|| document.root_id());
                let emptied = document.find(group).is_none_or(|e| e.is_empty());
                if emptied {
                    document.remove(group);
                    self.state = EditState::Browsing { group: parent };
                    self.clear_selection();
                } else {
                    self.state = EditState::Browsing { group: parent };
                    self.clear_selection();
                    self.selected_elements.push(group);
                }
            }
        }
    }

    /// Re-opens `focus` after an undo/redo restore. A stale id falls back
    /// to browsing the root.
    pub fn refocus(&mut self, document: &Document, focus: ElementId) {
        if self.open(document, focus).is_err() {
            debug!(id = focus.raw(), "stale focus, falling back to root");
            self.state = EditState::Browsing {
                group: document.root_id(),
            };
            self.clear_selection();
        }
    }

    pub fn selected_elements(&self) -> &[ElementId] {
        &self.selected_elements
    }

    pub fn selected_points(&self) -> Vec<usize> {
        self.selected_points.iter().copied().collect()
    }

    pub fn clear_selection(&mut self) {
        self.selected_elements.clear();
        self.selected_points.clear();
    }

    pub fn select_element(&mut self, id: ElementId) {
        if !self.selected_elements.contains(&id) {
            self.selected_elements.push(id);
        }
    }

    pub fn set_selected_elements(&mut self, ids: Vec<ElementId>) {
        self.selected_elements.clear();
        for id in ids {
            self.select_element(id);
        }
    }

    pub fn toggle_element(&mut self, id: ElementId) {
        match self.selected_elements.iter().position(|&e| e == id) {
            Some(idx) => {
                self.selected_elements.remove(idx);
            }
            None => self.selected_elements.push(id),
        }
    }

    pub fn select_point(&mut self, index: usize) {
        self.selected_points.insert(index);
    }

    pub fn set_selected_points(&mut self, indices: impl IntoIterator<Item = usize>) {
        self.selected_points = indices.into_iter().collect();
    }

    pub fn toggle_point(&mut self, index: usize) {
        if !self.selected_points.remove(&index) {
            self.selected_points.insert(index);
        }
    }

    /// Drops selected ids that no longer exist and point indices past the
    /// end of the open element.
    pub fn prune(&mut self, document: &Document) {
        self.selected_elements.retain(|&id| document.contains(id));
        if let EditState::PointEditing { element } = self.state {
            let count = document.find(element).map(|e| e.point_count()).unwrap_or(0);
            self.selected_points.retain(|&i| i < count);
        }
    }

    /// The current selection as a closest-point exclusion set, so drags do
    /// not snap to the geometry being dragged.
    pub fn exclusions(&self) -> ExcludeSet {
        let mut exclude = ExcludeSet::default();
        match self.state {
            EditState::Browsing { .. } => {
                exclude.elements.extend(self.selected_elements.iter().copied());
            }
            EditState::PointEditing { element } => {
                for &index in &self.selected_points {
                    exclude.points.insert((element, index));
                }
            }
        }
        exclude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, ElementKind, PathData};
    use engravekit_core::Point;

    fn doc_with_group_and_path() -> (Document, ElementId, ElementId) {
        let mut doc = Document::new();
        let root = doc.root_id();
        let group_id = doc.insert_child(root, None, Element::group("g")).unwrap();
        let path = Element::new(
            "p",
            ElementKind::Path(PathData::from_points(&[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
            ])),
        );
        let path_id = doc.insert_child(group_id, None, path).unwrap();
        (doc, group_id, path_id)
    }

    #[test]
    fn open_routes_groups_and_leaves() {
        let (doc, group_id, path_id) = doc_with_group_and_path();
        let mut edit = EditController::new(doc.root_id());

        edit.open(&doc, group_id).unwrap();
        assert_eq!(edit.state(), EditState::Browsing { group: group_id });

        edit.open(&doc, path_id).unwrap();
        assert_eq!(edit.state(), EditState::PointEditing { element: path_id });
    }

    #[test]
    fn escape_from_point_editing_selects_the_closed_element() {
        let (mut doc, group_id, path_id) = doc_with_group_and_path();
        let mut edit = EditController::new(doc.root_id());
        edit.open(&doc, path_id).unwrap();
        edit.escape(&mut doc);
        assert_eq!(edit.state(), EditState::Browsing { group: group_id });
        assert_eq!(edit.selected_elements(), &[path_id]);
    }

    #[test]
    fn escape_prunes_an_emptied_element() {
        let (mut doc, group_id, path_id) = doc_with_group_and_path();
        let mut edit = EditController::new(doc.root_id());
        edit.open(&doc, path_id).unwrap();
        doc.find_mut(path_id).unwrap().remove_point(1);
        doc.find_mut(path_id).unwrap().remove_point(0);
        edit.escape(&mut doc);
        assert!(!doc.contains(path_id));
        assert_eq!(edit.state(), EditState::Browsing { group: group_id });
        assert_eq!(edit.selected_elements(), &[group_id]);
    }

    #[test]
    fn escape_prunes_an_emptied_group_and_ascends() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let group_id = doc.insert_child(root, None, Element::group("g")).unwrap();
        let mut edit = EditController::new(root);
        edit.open(&doc, group_id).unwrap();
        edit.escape(&mut doc);
        assert!(!doc.contains(group_id));
        assert_eq!(edit.state(), EditState::Browsing { group: root });
        assert!(edit.selected_elements().is_empty());
    }

    #[test]
    fn escape_at_root_is_a_no_op() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let mut edit = EditController::new(root);
        edit.escape(&mut doc);
        assert_eq!(edit.state(), EditState::Browsing { group: root });
        assert!(doc.contains(root));
    }

    #[test]
    fn stale_refocus_falls_back_to_root() {
        let (mut doc, _, path_id) = doc_with_group_and_path();
        let mut edit = EditController::new(doc.root_id());
        doc.remove(path_id);
        edit.refocus(&doc, path_id);
        assert_eq!(
            edit.state(),
            EditState::Browsing {
                group: doc.root_id()
            }
        );
    }
}
