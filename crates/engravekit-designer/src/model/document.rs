//! The document: a single root group plus the tree queries the editing
//! engine is built on. No parent back-pointers are stored; parents are
//! re-discovered by tree search.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use engravekit_core::{Bounds, DesignError, Point, Result};

use super::{Element, ElementId, ElementKind, EngravingProperties};

/// Background image parameters carried in the project header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundParams {
    pub path: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Points and elements to skip in closest-point queries (typically the
/// current selection, so a drag does not snap to itself).
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    pub elements: HashSet<ElementId>,
    pub points: HashSet<(ElementId, usize)>,
}

impl ExcludeSet {
    pub fn excludes(&self, id: ElementId, point_index: usize) -> bool {
        self.elements.contains(&id) || self.points.contains(&(id, point_index))
    }
}

/// A vector document: exactly one root group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub root: Element,
    pub name: String,
    pub background: Option<BackgroundParams>,
    /// Unsaved-changes flag; set by every successful mutating command.
    #[serde(skip)]
    pub dirty: bool,
}

impl Document {
    pub fn new() -> Self {
        let mut root = Element::group("Project");
        root.properties = EngravingProperties::root_defaults();
        Self {
            root,
            name: "Untitled".to_string(),
            background: None,
            dirty: false,
        }
    }

    pub fn root_id(&self) -> ElementId {
        self.root.id()
    }

    /// Depth-first search for an element by id (root included).
    pub fn find(&self, id: ElementId) -> Option<&Element> {
        find_in(&self.root, id)
    }

    pub fn find_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        find_in_mut(&mut self.root, id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.find(id).is_some()
    }

    /// Id of the group owning `id`; `None` for the root or unknown ids.
    pub fn find_parent_id(&self, id: ElementId) -> Option<ElementId> {
        find_parent_in(&self.root, id)
    }

    /// Effective engraving properties of `id`, resolved root-down with every
    /// non-sentinel field overriding the inherited value.
    pub fn effective_properties(&self, id: ElementId) -> Option<EngravingProperties> {
        let chain = path_to(&self.root, id)?;
        let mut resolved = EngravingProperties::root_defaults();
        for element in chain {
            resolved = element.properties.resolve_over(&resolved);
        }
        Some(resolved)
    }

    /// Effective enabled flag (logical AND along the root-down walk).
    pub fn effective_enabled(&self, id: ElementId) -> bool {
        path_to(&self.root, id)
            .map(|chain| chain.iter().all(|e| e.enabled))
            .unwrap_or(false)
    }

    /// Inserts `element` into group `parent` at `index` (append when `None`).
    ///
    /// At the root the index is clamped so a "Header" child stays first and a
    /// "Footer" child stays last.
    pub fn insert_child(
        &mut self,
        parent: ElementId,
        index: Option<usize>,
        element: Element,
    ) -> Result<ElementId> {
        let at_root = parent == self.root.id();
        let id = element.id();
        let target = self
            .find_mut(parent)
            .ok_or(DesignError::StaleFocus { id: parent.raw() })?;
        let children = target.children_mut().ok_or_else(|| {
            DesignError::invalid(format!("element {} is not a group", parent.raw()))
        })?;
        let mut idx = index.unwrap_or(children.len()).min(children.len());
        if at_root {
            let lo = usize::from(
                children
                    .first()
                    .is_some_and(|c| c.name.eq_ignore_ascii_case("header")),
            );
            let hi = children.len()
                - usize::from(
                    children
                        .last()
                        .is_some_and(|c| c.name.eq_ignore_ascii_case("footer")),
                );
            idx = idx.clamp(lo, hi);
        }
        children.insert(idx, element);
        Ok(id)
    }

    /// Detaches `id` from its parent and returns it. The root cannot be
    /// removed.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        if id == self.root.id() {
            return None;
        }
        let parent_id = self.find_parent_id(id)?;
        let parent = self.find_mut(parent_id)?;
        let children = parent.children_mut()?;
        let idx = children.iter().position(|c| c.id() == id)?;
        Some(children.remove(idx))
    }

    /// Index of `id` within its parent.
    pub fn child_index(&self, id: ElementId) -> Option<usize> {
        let parent_id = self.find_parent_id(id)?;
        self.find(parent_id)?
            .children()?
            .iter()
            .position(|c| c.id() == id)
    }

    /// Depth-first iteration over the whole tree, root first.
    pub fn iter(&self) -> DepthFirstIter<'_> {
        DepthFirstIter {
            stack: vec![&self.root],
        }
    }

    pub fn element_count(&self) -> usize {
        self.iter().count()
    }

    /// Bounding box of all geometry; `None` for an empty document.
    pub fn bounding_box(&self) -> Option<Bounds> {
        self.root.bounds()
    }

    /// The document point closest to `query`, skipping the exclusion set.
    /// Returns the owning element, handle index and position.
    pub fn closest_point(
        &self,
        query: Point,
        exclude: &ExcludeSet,
    ) -> Option<(ElementId, usize, Point)> {
        let mut best: Option<(ElementId, usize, Point, f64)> = None;
        for element in self.iter() {
            if element.is_group() {
                continue;
            }
            let id = element.id();
            if exclude.elements.contains(&id) {
                continue;
            }
            for index in 0..element.point_count() {
                if exclude.excludes(id, index) {
                    continue;
                }
                let Some(p) = element.point(index) else {
                    continue;
                };
                let d = p.distance_to(&query);
                if best.map(|(_, _, _, bd)| d < bd).unwrap_or(true) {
                    best = Some((id, index, p, d));
                }
            }
        }
        best.map(|(id, index, p, _)| (id, index, p))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first element iterator.
pub struct DepthFirstIter<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for DepthFirstIter<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let next = self.stack.pop()?;
        if let Some(children) = next.children() {
            // Push in reverse so iteration visits children in order.
            for child in children.iter().rev() {
                self.stack.push(child);
            }
        }
        Some(next)
    }
}

fn find_in(element: &Element, id: ElementId) -> Option<&Element> {
    if element.id() == id {
        return Some(element);
    }
    element
        .children()?
        .iter()
        .find_map(|child| find_in(child, id))
}

fn find_in_mut(element: &mut Element, id: ElementId) -> Option<&mut Element> {
    if element.id() == id {
        return Some(element);
    }
    match &mut element.kind {
        ElementKind::Group(children) => children
            .iter_mut()
            .find_map(|child| find_in_mut(child, id)),
        _ => None,
    }
}

fn find_parent_in(element: &Element, id: ElementId) -> Option<ElementId> {
    let children = element.children()?;
    if children.iter().any(|c| c.id() == id) {
        return Some(element.id());
    }
    children.iter().find_map(|child| find_parent_in(child, id))
}

/// Chain of elements from the root down to `id`, inclusive.
fn path_to(element: &Element, id: ElementId) -> Option<Vec<&Element>> {
    if element.id() == id {
        return Some(vec![element]);
    }
    for child in element.children()? {
        if let Some(mut chain) = path_to(child, id) {
            chain.insert(0, element);
            return Some(chain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArcData, PathData};

    fn doc_with_path() -> (Document, ElementId) {
        let mut doc = Document::new();
        let path = Element::new(
            "p",
            ElementKind::Path(PathData::from_points(&[
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
            ])),
        );
        let root = doc.root_id();
        let id = doc.insert_child(root, None, path).unwrap();
        (doc, id)
    }

    #[test]
    fn find_parent_by_tree_search() {
        let (mut doc, path_id) = doc_with_path();
        let root = doc.root_id();
        assert_eq!(doc.find_parent_id(path_id), Some(root));
        assert_eq!(doc.find_parent_id(root), None);

        let group = Element::group("g");
        let group_id = doc.insert_child(root, None, group).unwrap();
        let nested = Element::new("a", ElementKind::Arc(ArcData::circle(Point::new(0.0, 0.0), 5.0)));
        let nested_id = doc.insert_child(group_id, None, nested).unwrap();
        assert_eq!(doc.find_parent_id(nested_id), Some(group_id));
    }

    #[test]
    fn header_stays_first_footer_stays_last() {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.insert_child(root, None, Element::group("Header")).unwrap();
        doc.insert_child(root, None, Element::group("Footer")).unwrap();
        // Requested index 0 must land after the header.
        let id = doc
            .insert_child(root, Some(0), Element::group("content"))
            .unwrap();
        let children = doc.root.children().unwrap();
        assert_eq!(children[0].name, "Header");
        assert_eq!(children[1].id(), id);
        assert_eq!(children[2].name, "Footer");

        // Appending clamps before the footer.
        let id2 = doc
            .insert_child(root, None, Element::group("more"))
            .unwrap();
        let children = doc.root.children().unwrap();
        assert_eq!(children[2].id(), id2);
        assert_eq!(children[3].name, "Footer");
    }

    #[test]
    fn effective_properties_resolve_down_the_chain() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let mut group = Element::group("g");
        group.properties.power = 80.0;
        let group_id = doc.insert_child(root, None, group).unwrap();
        let mut path = Element::new(
            "p",
            ElementKind::Path(PathData::from_points(&[Point::new(0.0, 0.0)])),
        );
        path.properties.passes = 4;
        let path_id = doc.insert_child(group_id, None, path).unwrap();

        let eff = doc.effective_properties(path_id).unwrap();
        assert_eq!(eff.power, 80.0);
        assert_eq!(eff.passes, 4);
        assert_eq!(eff.feed_rate, 1000.0);
    }

    #[test]
    fn effective_enabled_ands_down_the_chain() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let mut group = Element::group("g");
        group.enabled = false;
        let group_id = doc.insert_child(root, None, group).unwrap();
        let drill = Element::new("d", ElementKind::Drill(Point::new(0.0, 0.0)));
        let drill_id = doc.insert_child(group_id, None, drill).unwrap();
        assert!(!doc.effective_enabled(drill_id));
    }

    #[test]
    fn remove_detaches_subtree() {
        let (mut doc, path_id) = doc_with_path();
        let removed = doc.remove(path_id).unwrap();
        assert_eq!(removed.id(), path_id);
        assert!(!doc.contains(path_id));
        assert!(doc.remove(doc.root_id()).is_none());
    }

    #[test]
    fn serialized_snapshot_restores_the_tree() {
        let (mut doc, path_id) = doc_with_path();
        doc.dirty = true;
        let json = serde_json::to_string(&doc).unwrap();
        let restored: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.root, doc.root);
        assert!(restored.contains(path_id));
        // The unsaved-changes flag is transient state, not document content.
        assert!(!restored.dirty);
    }

    #[test]
    fn closest_point_honors_exclusions() {
        let (doc, path_id) = doc_with_path();
        let (id, index, p) = doc
            .closest_point(Point::new(9.0, 1.0), &ExcludeSet::default())
            .unwrap();
        assert_eq!((id, index), (path_id, 1));
        assert_eq!(p, Point::new(10.0, 0.0));

        let mut exclude = ExcludeSet::default();
        exclude.points.insert((path_id, 1));
        let (_, index, _) = doc.closest_point(Point::new(9.0, 1.0), &exclude).unwrap();
        assert_eq!(index, 0);

        exclude.elements.insert(path_id);
        assert!(doc.closest_point(Point::new(9.0, 1.0), &exclude).is_none());
    }
}
