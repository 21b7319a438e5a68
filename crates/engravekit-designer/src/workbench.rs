//! The command dispatcher: the single mutating entry point over the
//! document, selection, history and session state.
//!
//! Every structural command that succeeds marks the document dirty and
//! takes exactly one checkpoint before returning. Commands with unmet
//! preconditions return `false` without touching the model. View toggles
//! mutate presentation state only and are never checkpointed.

use tracing::{debug, warn};

use engravekit_core::geometry::{centroid, rotate_point, scale_point, segment_intersection};
use engravekit_core::{Bounds, Point, Result};

use crate::edit::{EditController, EditState};
use crate::geom::{
    convex_hull, flatten_element, join_set, offset_contours, pocket_rings, simplify_by_angle,
    simplify_by_distance, OffsetSide,
};
use crate::history::History;
use crate::model::{
    Document, Element, ElementId, ElementKind, MixedPathData, PathData, TextOnPathData,
};
use crate::pending::{GestureOutcome, PendingOperation};
use crate::session::SessionContext;
use crate::snap::SnapResolver;

/// The closed set of dispatcher operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Transforms. Each applies to the selected points of the open element
    // or to the selected elements of the open group, whichever is non-empty.
    Move,
    Rotate,
    Scale,
    FlipHorizontal,
    FlipVertical,
    AlignLeft,
    AlignRight,
    AlignTop,
    AlignBottom,
    AlignCenterX,
    AlignCenterY,
    // Topology.
    Group,
    Ungroup,
    Join,
    Extract,
    Duplicate,
    Reverse,
    ChangeStartPoint,
    Delete,
    // Derived geometry.
    Pocket,
    OffsetInner,
    OffsetOuter,
    ConvexHull,
    Flatten,
    LinkedPath,
    TextOnPath,
    // Point operations.
    SimplifyByAngle,
    SimplifyByDistance,
    AddIntersectionPoints,
    AddPointsAtHalf,
    // Clipboard.
    Copy,
    Cut,
    Paste,
    // History.
    Undo,
    Redo,
    // View toggles: presentation only, never checkpointed.
    ToggleGrid,
    ToggleGridSnap,
    ToggleRapids,
    ToggleDisabled,
}

/// Optional arguments beyond the single numeric parameter.
#[derive(Debug, Clone)]
pub struct CommandPayload {
    /// Transform origin; `None` means the selection's own center.
    pub origin: Option<Point>,
    /// Move delta or (x, y) scale ratios.
    pub vector: Option<Point>,
    /// Extra copies for transforms and duplicate.
    pub copies: usize,
    /// Keep the originals when producing copies.
    pub keep_original: bool,
    /// Wrap each copy's element set into its own sub-group.
    pub packed: bool,
    /// Force the origin to the selection center even if `origin` is set.
    pub from_center: bool,
    /// Force equal X/Y scale ratios.
    pub lock_aspect: bool,
    /// Text content for text-on-path.
    pub text: Option<String>,
    /// Pre-built glyph outlines for text-on-path (glyph rendering is an
    /// external collaborator).
    pub glyphs: Vec<MixedPathData>,
}

impl Default for CommandPayload {
    /// Copy-producing commands keep the originals unless told otherwise.
    fn default() -> Self {
        Self {
            origin: None,
            vector: None,
            copies: 0,
            keep_original: true,
            packed: false,
            from_center: false,
            lock_aspect: false,
            text: None,
            glyphs: Vec::new(),
        }
    }
}

/// What a transform operates on.
enum Target {
    Points(ElementId, Vec<usize>),
    Elements(Vec<ElementId>),
    Nothing,
}

struct Gesture {
    op: PendingOperation,
    before: Document,
    before_focus: ElementId,
}

pub struct Workbench {
    pub document: Document,
    pub edit: EditController,
    pub history: History,
    pub session: SessionContext,
    pub snap: SnapResolver,
    pending: Option<Gesture>,
}

impl Workbench {
    pub fn new() -> Self {
        let document = Document::new();
        let root = document.root_id();
        let mut history = History::new();
        history.reset(&document, root);
        Self {
            document,
            edit: EditController::new(root),
            history,
            session: SessionContext::new(),
            snap: SnapResolver::default(),
            pending: None,
        }
    }

    /// Replaces the working document, resetting focus and history.
    pub fn load(&mut self, document: Document) {
        let root = document.root_id();
        self.document = document;
        self.edit = EditController::new(root);
        self.history.reset(&self.document, root);
        self.pending = None;
    }

    /// Opens an element for editing (groups browse, leaves point-edit).
    pub fn open(&mut self, id: ElementId) -> Result<()> {
        self.edit.open(&self.document, id)
    }

    /// Closes the current editing level; a pruned empty container is a
    /// model change and gets checkpointed.
    pub fn escape(&mut self) {
        let focus = self.edit.focus();
        self.edit.escape(&mut self.document);
        if !self.document.contains(focus) {
            self.commit();
        }
    }

    /// Snaps a raw pointer coordinate, excluding the current selection.
    pub fn resolve_snap(&self, query: Point) -> Point {
        self.snap
            .resolve(&self.document, &self.session, query, &self.edit.exclusions())
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(checkpoint) => {
                self.document = checkpoint.document;
                self.edit.refocus(&self.document, checkpoint.focus);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(checkpoint) => {
                self.document = checkpoint.document;
                self.edit.refocus(&self.document, checkpoint.focus);
                true
            }
            None => false,
        }
    }

    /// Dispatches `action` with a dialog-sourced textual parameter. A
    /// parameter that fails to parse never reaches the model.
    pub fn execute_parsed(&mut self, action: Action, param: &str, payload: &CommandPayload) -> bool {
        match param.trim().parse::<f64>() {
            Ok(value) => self.execute(action, value, payload),
            Err(_) => {
                warn!(?action, param, "unparseable numeric parameter");
                false
            }
        }
    }

    /// Executes one named operation. Returns `false` (and leaves the model
    /// untouched) when preconditions are unmet.
    pub fn execute(&mut self, action: Action, param: f64, payload: &CommandPayload) -> bool {
        debug!(?action, param, "execute");
        let ok = match action {
            Action::Move => self.cmd_move(payload),
            Action::Rotate => self.cmd_rotate(param, payload),
            Action::Scale => self.cmd_scale(payload),
            Action::FlipHorizontal => self.cmd_flip(true, payload),
            Action::FlipVertical => self.cmd_flip(false, payload),
            Action::AlignLeft
            | Action::AlignRight
            | Action::AlignTop
            | Action::AlignBottom
            | Action::AlignCenterX
            | Action::AlignCenterY => self.cmd_align(action),
            Action::Group => self.cmd_group(),
            Action::Ungroup => self.cmd_ungroup(),
            Action::Join => self.cmd_join(param),
            Action::Extract => self.cmd_extract(),
            Action::Duplicate => self.cmd_duplicate(payload),
            Action::Reverse => self.cmd_reverse(),
            Action::ChangeStartPoint => self.cmd_change_start_point(),
            Action::Delete => self.cmd_delete(),
            Action::Pocket => self.cmd_pocket(param),
            Action::OffsetInner => self.cmd_offset(param, OffsetSide::Inner),
            Action::OffsetOuter => self.cmd_offset(param, OffsetSide::Outer),
            Action::ConvexHull => self.cmd_convex_hull(),
            Action::Flatten => self.cmd_flatten(param),
            Action::LinkedPath => self.cmd_linked_path(),
            Action::TextOnPath => self.cmd_text_on_path(payload),
            Action::SimplifyByAngle => self.cmd_simplify(param, true),
            Action::SimplifyByDistance => self.cmd_simplify(param, false),
            Action::AddIntersectionPoints => self.cmd_add_intersections(),
            Action::AddPointsAtHalf => self.cmd_add_points_at_half(),
            Action::Copy => return self.cmd_copy(),
            Action::Cut => self.cmd_cut(),
            Action::Paste => self.cmd_paste(),
            Action::Undo => return self.undo(),
            Action::Redo => return self.redo(),
            Action::ToggleGrid => {
                self.session.view.show_grid = !self.session.view.show_grid;
                return true;
            }
            Action::ToggleGridSnap => {
                self.session.grid.snap_enabled = !self.session.grid.snap_enabled;
                return true;
            }
            Action::ToggleRapids => {
                self.session.view.show_rapids = !self.session.view.show_rapids;
                return true;
            }
            Action::ToggleDisabled => {
                self.session.view.show_disabled = !self.session.view.show_disabled;
                return true;
            }
        };
        if ok {
            self.commit();
        }
        ok
    }

    fn commit(&mut self) {
        self.document.dirty = true;
        self.edit.prune(&self.document);
        self.history.checkpoint(&self.document, self.edit.focus());
    }

    // ------------------------------------------------------------------
    // Selection plumbing
    // ------------------------------------------------------------------

    fn target(&self) -> Target {
        if let EditState::PointEditing { element } = self.edit.state() {
            let points = self.edit.selected_points();
            if !points.is_empty() {
                return Target::Points(element, points);
            }
        }
        let elements = self.edit.selected_elements().to_vec();
        if elements.is_empty() {
            Target::Nothing
        } else {
            Target::Elements(elements)
        }
    }

    fn selection_bounds(&self) -> Option<Bounds> {
        match self.target() {
            Target::Points(element, indices) => {
                let element = self.document.find(element)?;
                let points: Vec<Point> =
                    indices.iter().filter_map(|&i| element.point(i)).collect();
                Bounds::from_points(&points)
            }
            Target::Elements(ids) => ids
                .iter()
                .filter_map(|&id| self.document.find(id)?.bounds())
                .reduce(|a, b| a.union(&b)),
            Target::Nothing => None,
        }
    }

    fn transform_origin(&self, payload: &CommandPayload) -> Option<Point> {
        if !payload.from_center {
            if let Some(origin) = payload.origin {
                return Some(origin);
            }
        }
        self.selection_bounds().map(|b| b.center())
    }

    /// Applies `transform` to every selected point/element. Returns `false`
    /// for an empty selection.
    fn transform_selection(&mut self, transform: impl Fn(Point) -> Point) -> bool {
        match self.target() {
            Target::Points(id, indices) => {
                let Some(element) = self.document.find_mut(id) else {
                    return false;
                };
                for index in indices {
                    if let Some(p) = element.point(index) {
                        element.set_point(index, transform(p));
                    }
                }
                true
            }
            Target::Elements(ids) => {
                for id in ids {
                    if let Some(element) = self.document.find_mut(id) {
                        for index in 0..element.point_count() {
                            if let Some(p) = element.point(index) {
                                element.set_point(index, transform(p));
                            }
                        }
                    }
                }
                true
            }
            Target::Nothing => false,
        }
    }

    /// Inserts `copies` transformed clones of the selected elements into
    /// the open group, optionally packing each copy into its own sub-group
    /// and optionally removing the originals.
    fn emit_copies(
        &mut self,
        payload: &CommandPayload,
        transform: &dyn Fn(&mut Element, usize),
    ) -> bool {
        if payload.copies == 0 {
            return true;
        }
        // Copies need whole elements; a point selection cannot clone.
        let Target::Elements(ids) = self.target() else {
            return false;
        };
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        for k in 1..=payload.copies {
            let mut batch: Vec<Element> = Vec::new();
            for &id in &ids {
                let Some(original) = self.document.find(id) else {
                    continue;
                };
                let mut clone = original.with_regenerated_ids();
                transform(&mut clone, k);
                batch.push(clone);
            }
            if payload.packed {
                let mut wrapper = Element::group(format!("Copy {k}"));
                *wrapper.children_mut().expect("group") = batch;
                batch = vec![wrapper];
            }
            for element in batch {
                if self.document.insert_child(group, None, element).is_err() {
                    return false;
                }
            }
        }
        if !payload.keep_original {
            for id in ids {
                self.document.remove(id);
            }
            self.edit.clear_selection();
        }
        true
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    fn cmd_move(&mut self, payload: &CommandPayload) -> bool {
        let Some(delta) = payload.vector else {
            return false;
        };
        if matches!(self.target(), Target::Nothing) {
            return false;
        }
        if !self.emit_copies(payload, &|element, k| {
            element.translate(delta.x * k as f64, delta.y * k as f64)
        }) {
            return false;
        }
        // Copies carry the transform; the original only moves when no
        // copies were requested.
        if payload.copies == 0 {
            self.transform_selection(|p| Point::new(p.x + delta.x, p.y + delta.y));
        }
        true
    }

    fn cmd_rotate(&mut self, angle_deg: f64, payload: &CommandPayload) -> bool {
        let Some(origin) = self.transform_origin(payload) else {
            return false;
        };
        if !self.emit_copies(payload, &|element, k| {
            element.rotate_about(origin, angle_deg * k as f64)
        }) {
            return false;
        }
        if payload.copies == 0 {
            self.transform_selection(|p| rotate_point(p, origin, angle_deg));
        }
        true
    }

    fn scale_ratios(&self, payload: &CommandPayload) -> Option<(f64, f64)> {
        let ratios = payload.vector?;
        let (mut sx, mut sy) = (ratios.x, ratios.y);
        if sx == 0.0 || sy == 0.0 {
            return None;
        }
        let needs_uniform = payload.lock_aspect
            || self
                .edit
                .selected_elements()
                .iter()
                .filter_map(|&id| self.document.find(id))
                .any(|e| e.uniform_scale_only());
        if needs_uniform {
            // The larger magnitude wins.
            let m = if sx.abs() >= sy.abs() { sx } else { sy };
            sx = m;
            sy = m;
        }
        Some((sx, sy))
    }

    fn cmd_scale(&mut self, payload: &CommandPayload) -> bool {
        let Some((sx, sy)) = self.scale_ratios(payload) else {
            return false;
        };
        let Some(origin) = self.transform_origin(payload) else {
            return false;
        };
        if !self.emit_copies(payload, &|element, k| {
            element.scale_about(origin, sx.powi(k as i32), sy.powi(k as i32))
        }) {
            return false;
        }
        if payload.copies == 0 {
            match self.target() {
                Target::Elements(ids) => {
                    for id in ids {
                        if let Some(element) = self.document.find_mut(id) {
                            element.scale_about(origin, sx, sy);
                        }
                    }
                }
                Target::Points(..) => {
                    self.transform_selection(|p| scale_point(p, origin, sx, sy));
                }
                Target::Nothing => return false,
            }
        }
        true
    }

    fn cmd_flip(&mut self, horizontal: bool, payload: &CommandPayload) -> bool {
        let Some(origin) = self.transform_origin(payload) else {
            return false;
        };
        let (sx, sy) = if horizontal { (-1.0, 1.0) } else { (1.0, -1.0) };
        match self.target() {
            Target::Elements(ids) => {
                for id in ids {
                    if let Some(element) = self.document.find_mut(id) {
                        element.scale_about(origin, sx, sy);
                    }
                }
                true
            }
            Target::Points(..) => self.transform_selection(|p| scale_point(p, origin, sx, sy)),
            Target::Nothing => false,
        }
    }

    fn cmd_align(&mut self, action: Action) -> bool {
        let Some(bounds) = self.selection_bounds() else {
            return false;
        };
        match self.target() {
            Target::Points(id, indices) => {
                if indices.len() < 2 {
                    return false;
                }
                let Some(element) = self.document.find_mut(id) else {
                    return false;
                };
                for index in indices {
                    let Some(p) = element.point(index) else {
                        continue;
                    };
                    let q = align_target(action, p, &bounds);
                    element.set_point(index, q);
                }
                true
            }
            Target::Elements(ids) => {
                if ids.len() < 2 {
                    return false;
                }
                for id in ids {
                    let Some(element) = self.document.find_mut(id) else {
                        continue;
                    };
                    let Some(eb) = element.bounds() else {
                        continue;
                    };
                    let (dx, dy) = match action {
                        Action::AlignLeft => (bounds.min_x - eb.min_x, 0.0),
                        Action::AlignRight => (bounds.max_x - eb.max_x, 0.0),
                        Action::AlignTop => (0.0, bounds.max_y - eb.max_y),
                        Action::AlignBottom => (0.0, bounds.min_y - eb.min_y),
                        Action::AlignCenterX => (bounds.center().x - eb.center().x, 0.0),
                        Action::AlignCenterY => (0.0, bounds.center().y - eb.center().y),
                        _ => (0.0, 0.0),
                    };
                    element.translate(dx, dy);
                }
                true
            }
            Target::Nothing => false,
        }
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    fn cmd_group(&mut self) -> bool {
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let ids = self.edit.selected_elements().to_vec();
        if ids.is_empty() {
            return false;
        }
        let insert_at = ids
            .iter()
            .filter_map(|&id| self.document.child_index(id))
            .min()
            .unwrap_or(0);
        let mut members = Vec::new();
        for &id in &ids {
            if let Some(element) = self.document.remove(id) {
                members.push(element);
            }
        }
        if members.is_empty() {
            return false;
        }
        let mut wrapper = Element::group("Group");
        *wrapper.children_mut().expect("group") = members;
        let new_id = match self.document.insert_child(group, Some(insert_at), wrapper) {
            Ok(id) => id,
            Err(_) => return false,
        };
        self.edit.set_selected_elements(vec![new_id]);
        true
    }

    fn cmd_ungroup(&mut self) -> bool {
        let ids: Vec<ElementId> = self
            .edit
            .selected_elements()
            .iter()
            .copied()
            .filter(|&id| self.document.find(id).is_some_and(|e| e.is_group()))
            .collect();
        if ids.is_empty() {
            return false;
        }
        let mut spliced = Vec::new();
        for id in ids {
            let Some(parent) = self.document.find_parent_id(id) else {
                continue;
            };
            let Some(index) = self.document.child_index(id) else {
                continue;
            };
            let Some(removed) = self.document.remove(id) else {
                continue;
            };
            let ElementKind::Group(children) = removed.kind else {
                continue;
            };
            for (offset, child) in children.into_iter().enumerate() {
                let child_id = child.id();
                if self
                    .document
                    .insert_child(parent, Some(index + offset), child)
                    .is_ok()
                {
                    spliced.push(child_id);
                }
            }
        }
        if spliced.is_empty() {
            return false;
        }
        self.edit.set_selected_elements(spliced);
        true
    }

    fn cmd_join(&mut self, param: f64) -> bool {
        let epsilon = if param > 0.0 { param } else { 0.01 };
        // Point-level join collapses the selected points onto their
        // centroid (the align/center rule).
        if let Target::Points(id, indices) = self.target() {
            if indices.len() < 2 {
                return false;
            }
            let Some(element) = self.document.find_mut(id) else {
                return false;
            };
            let points: Vec<Point> = indices.iter().filter_map(|&i| element.point(i)).collect();
            let Some(center) = centroid(&points) else {
                return false;
            };
            for index in indices {
                element.set_point(index, center);
            }
            return true;
        }

        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let ids = self.edit.selected_elements().to_vec();
        if ids.len() < 2 {
            return false;
        }
        let inputs: Vec<Element> = ids
            .iter()
            .filter_map(|&id| self.document.find(id).cloned())
            .collect();
        let joined = join_set(inputs, epsilon);
        if joined.len() == ids.len() {
            return false; // nothing was close enough to join
        }
        let insert_at = ids
            .iter()
            .filter_map(|&id| self.document.child_index(id))
            .min()
            .unwrap_or(0);
        for &id in &ids {
            self.document.remove(id);
        }
        let mut selected = Vec::new();
        for (offset, element) in joined.into_iter().enumerate() {
            match self
                .document
                .insert_child(group, Some(insert_at + offset), element)
            {
                Ok(id) => selected.push(id),
                Err(_) => return false,
            }
        }
        self.edit.set_selected_elements(selected);
        true
    }

    fn cmd_extract(&mut self) -> bool {
        match self.target() {
            Target::Points(id, indices) => {
                let Some(element) = self.document.find(id) else {
                    return false;
                };
                let points: Vec<Point> = indices.iter().filter_map(|&i| element.point(i)).collect();
                if points.is_empty() {
                    return false;
                }
                let parent = self
                    .document
                    .find_parent_id(id)
                    .unwrap_or_else(|| self.document.root_id());
                let destination = self
                    .document
                    .find_parent_id(parent)
                    .unwrap_or_else(|| self.document.root_id());
                let Some(element) = self.document.find_mut(id) else {
                    return false;
                };
                for &index in indices.iter().rev() {
                    element.remove_point(index);
                }
                let extracted = Element::new(
                    "Extracted",
                    ElementKind::Path(PathData::from_points(&points)),
                );
                if self.document.insert_child(destination, None, extracted).is_err() {
                    return false;
                }
                self.edit.clear_selection();
                true
            }
            Target::Elements(ids) => {
                let Some(group) = self.edit.edited_group() else {
                    return false;
                };
                // Promote one level up; extracting at the root stays there.
                let destination = self
                    .document
                    .find_parent_id(group)
                    .unwrap_or_else(|| self.document.root_id());
                let mut taken = Vec::new();
                for &id in &ids {
                    if let Some(element) = self.document.remove(id) {
                        taken.push(element);
                    }
                }
                if taken.is_empty() {
                    return false;
                }
                let element = if taken.len() == 1 {
                    taken.pop().expect("one element")
                } else {
                    let mut wrapper = Element::group("Extracted");
                    *wrapper.children_mut().expect("group") = taken;
                    wrapper
                };
                if self.document.insert_child(destination, None, element).is_err() {
                    return false;
                }
                self.edit.clear_selection();
                true
            }
            Target::Nothing => false,
        }
    }

    fn cmd_duplicate(&mut self, payload: &CommandPayload) -> bool {
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let ids = self.edit.selected_elements().to_vec();
        if ids.is_empty() {
            return false;
        }
        let copies = payload.copies.max(1);
        let delta = payload.vector.unwrap_or(Point::new(0.0, 0.0));
        let mut selected = Vec::new();
        for k in 1..=copies {
            let mut batch = Vec::new();
            for &id in &ids {
                let Some(original) = self.document.find(id) else {
                    continue;
                };
                let mut clone = original.with_regenerated_ids();
                clone.translate(delta.x * k as f64, delta.y * k as f64);
                batch.push(clone);
            }
            if payload.packed {
                let mut wrapper = Element::group(format!("Copy {k}"));
                *wrapper.children_mut().expect("group") = batch;
                batch = vec![wrapper];
            }
            for element in batch {
                match self.document.insert_child(group, None, element) {
                    Ok(id) => selected.push(id),
                    Err(_) => return false,
                }
            }
        }
        if !payload.keep_original {
            for &id in &ids {
                self.document.remove(id);
            }
        }
        self.edit.set_selected_elements(selected);
        true
    }

    fn cmd_reverse(&mut self) -> bool {
        match self.edit.state() {
            EditState::PointEditing { element } => {
                let Some(element) = self.document.find_mut(element) else {
                    return false;
                };
                element.reverse();
                true
            }
            EditState::Browsing { .. } => {
                let ids = self.edit.selected_elements().to_vec();
                if ids.is_empty() {
                    return false;
                }
                for id in ids {
                    if let Some(element) = self.document.find_mut(id) {
                        element.reverse();
                    }
                }
                true
            }
        }
    }

    fn cmd_change_start_point(&mut self) -> bool {
        let Target::Points(id, indices) = self.target() else {
            return false;
        };
        if indices.len() != 1 {
            return false;
        }
        let start = indices[0];
        let Some(element) = self.document.find_mut(id) else {
            return false;
        };
        let ElementKind::Path(path) = &mut element.kind else {
            return false;
        };
        if !path.is_closed() || start == 0 {
            return false;
        }
        // Rotate the open ring so `start` leads, then re-close.
        let mut ring = path.positions();
        ring.pop();
        if start >= ring.len() {
            return false;
        }
        ring.rotate_left(start);
        *path = PathData::closed_from_points(&ring);
        self.edit.set_selected_points([0]);
        true
    }

    fn cmd_delete(&mut self) -> bool {
        match self.target() {
            Target::Points(id, indices) => {
                let Some(element) = self.document.find_mut(id) else {
                    return false;
                };
                for &index in indices.iter().rev() {
                    element.remove_point(index);
                }
                self.edit.set_selected_points(std::iter::empty());
                true
            }
            Target::Elements(ids) => {
                for id in ids {
                    self.document.remove(id);
                }
                self.edit.clear_selection();
                true
            }
            Target::Nothing => false,
        }
    }

    // ------------------------------------------------------------------
    // Derived geometry
    // ------------------------------------------------------------------

    /// Replaces each element of `ids` (all children of the open group)
    /// with the elements `produce` maps it to.
    fn replace_selection(
        &mut self,
        ids: &[ElementId],
        produce: impl Fn(&Element) -> Option<Vec<Element>>,
    ) -> bool {
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let mut replacements: Vec<(ElementId, usize, Vec<Element>)> = Vec::new();
        for &id in ids {
            let Some(element) = self.document.find(id) else {
                continue;
            };
            let Some(index) = self.document.child_index(id) else {
                continue;
            };
            if let Some(produced) = produce(element) {
                replacements.push((id, index, produced));
            }
        }
        if replacements.is_empty() {
            return false;
        }
        let mut selected = Vec::new();
        // Apply highest index first so earlier indices stay valid.
        replacements.sort_by(|a, b| b.1.cmp(&a.1));
        for (id, index, produced) in replacements {
            self.document.remove(id);
            for (offset, element) in produced.into_iter().enumerate() {
                match self
                    .document
                    .insert_child(group, Some(index + offset), element)
                {
                    Ok(new_id) => selected.push(new_id),
                    Err(_) => return false,
                }
            }
        }
        self.edit.set_selected_elements(selected);
        true
    }

    fn cmd_pocket(&mut self, param: f64) -> bool {
        let step = if param > 0.0 { param } else { 1.0 };
        let ids = self.edit.selected_elements().to_vec();
        self.replace_selection(&ids, |element| {
            if !element.is_closed() {
                return None;
            }
            let outline = element.sample_outlines(0.05).into_iter().next()?;
            match pocket_rings(&outline, step) {
                Ok(pocket) => {
                    let mut out =
                        Element::new(format!("{} pocket", element.name), ElementKind::Pocket(pocket));
                    out.properties = element.properties;
                    out.properties.all_at_once = true;
                    Some(vec![out])
                }
                Err(err) => {
                    warn!(%err, "pocket failed");
                    None
                }
            }
        })
    }

    fn cmd_offset(&mut self, distance: f64, side: OffsetSide) -> bool {
        let ids = self.edit.selected_elements().to_vec();
        let outlines: Vec<Vec<Point>> = ids
            .iter()
            .filter_map(|&id| self.document.find(id))
            .filter(|e| e.is_closed() || e.is_group())
            .flat_map(|e| e.sample_outlines(0.05))
            .collect();
        if outlines.is_empty() {
            return false;
        }
        let contours = match offset_contours(&outlines, distance, side) {
            Ok(contours) => contours,
            Err(err) => {
                warn!(%err, "offset failed");
                return false;
            }
        };
        let produced: Vec<Element> = contours
            .into_iter()
            .enumerate()
            .map(|(i, path)| Element::new(format!("Offset {}", i + 1), ElementKind::Path(path)))
            .collect();
        self.replace_all_with(&ids, produced)
    }

    fn cmd_convex_hull(&mut self) -> bool {
        let ids = self.edit.selected_elements().to_vec();
        let points: Vec<Point> = ids
            .iter()
            .filter_map(|&id| self.document.find(id))
            .flat_map(|e| e.sample_outlines(0.05))
            .flatten()
            .collect();
        let hull = match convex_hull(&points) {
            Ok(hull) => hull,
            Err(err) => {
                warn!(%err, "hull failed");
                return false;
            }
        };
        let element = Element::new(
            "Hull",
            ElementKind::Path(PathData::closed_from_points(&hull)),
        );
        self.replace_all_with(&ids, vec![element])
    }

    fn cmd_flatten(&mut self, param: f64) -> bool {
        let tolerance = if param > 0.0 { param } else { 0.1 };
        let ids = self.edit.selected_elements().to_vec();
        self.replace_selection(&ids, |element| {
            Some(vec![flatten_element(element, tolerance)])
        })
    }

    fn cmd_linked_path(&mut self) -> bool {
        let ids = self.edit.selected_elements().to_vec();
        if ids.len() < 2 {
            return false;
        }
        let mut points = Vec::new();
        for &id in &ids {
            let Some(element) = self.document.find(id) else {
                continue;
            };
            for outline in element.sample_outlines(0.05) {
                points.extend(outline);
            }
        }
        if points.len() < 2 {
            return false;
        }
        let element = Element::new("Linked", ElementKind::Path(PathData::from_points(&points)));
        self.replace_all_with(&ids, vec![element])
    }

    fn cmd_text_on_path(&mut self, payload: &CommandPayload) -> bool {
        let Some(text) = payload.text.clone() else {
            return false;
        };
        if payload.glyphs.is_empty() {
            return false;
        }
        let ids = self.edit.selected_elements().to_vec();
        if ids.len() != 1 {
            return false;
        }
        let Some(element) = self.document.find(ids[0]) else {
            return false;
        };
        let ElementKind::Path(guide) = &element.kind else {
            return false;
        };
        let data = TextOnPathData {
            text: text.clone(),
            glyphs: payload.glyphs.clone(),
            guide: guide.clone(),
        };
        let out = Element::new(text, ElementKind::TextOnPath(data));
        self.replace_all_with(&ids, vec![out])
    }

    /// Removes all of `ids` and inserts `produced` at the lowest vacated
    /// index of the open group.
    fn replace_all_with(&mut self, ids: &[ElementId], produced: Vec<Element>) -> bool {
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let insert_at = ids
            .iter()
            .filter_map(|&id| self.document.child_index(id))
            .min()
            .unwrap_or(0);
        for &id in ids {
            self.document.remove(id);
        }
        let mut selected = Vec::new();
        for (offset, element) in produced.into_iter().enumerate() {
            match self
                .document
                .insert_child(group, Some(insert_at + offset), element)
            {
                Ok(id) => selected.push(id),
                Err(_) => return false,
            }
        }
        self.edit.set_selected_elements(selected);
        true
    }

    // ------------------------------------------------------------------
    // Point operations
    // ------------------------------------------------------------------

    fn cmd_simplify(&mut self, threshold: f64, by_angle: bool) -> bool {
        if threshold <= 0.0 {
            return false;
        }
        let run = |points: &[Point], keep: &std::collections::HashSet<usize>| {
            if by_angle {
                simplify_by_angle(points, threshold, keep)
            } else {
                simplify_by_distance(points, threshold, keep)
            }
        };
        match self.edit.state() {
            EditState::PointEditing { element } => {
                let keep: std::collections::HashSet<usize> =
                    self.edit.selected_points().into_iter().collect();
                let Some(element) = self.document.find_mut(element) else {
                    return false;
                };
                let ElementKind::Path(path) = &mut element.kind else {
                    return false;
                };
                let before = path.points.len();
                let simplified = run(&path.positions(), &keep);
                if simplified.len() == before {
                    return false;
                }
                *path = PathData::from_points(&simplified);
                self.edit.set_selected_points(std::iter::empty());
                true
            }
            EditState::Browsing { .. } => {
                let ids = self.edit.selected_elements().to_vec();
                let keep = std::collections::HashSet::new();
                let mut changed = false;
                for id in ids {
                    let Some(element) = self.document.find_mut(id) else {
                        continue;
                    };
                    let ElementKind::Path(path) = &mut element.kind else {
                        continue;
                    };
                    let simplified = run(&path.positions(), &keep);
                    if simplified.len() != path.points.len() {
                        *path = PathData::from_points(&simplified);
                        changed = true;
                    }
                }
                changed
            }
        }
    }

    fn cmd_add_intersections(&mut self) -> bool {
        let ids: Vec<ElementId> = self
            .edit
            .selected_elements()
            .iter()
            .copied()
            .filter(|&id| {
                self.document
                    .find(id)
                    .is_some_and(|e| matches!(e.kind, ElementKind::Path(_)))
            })
            .collect();
        if ids.len() < 2 {
            return false;
        }
        let polylines: Vec<Vec<Point>> = ids
            .iter()
            .filter_map(|&id| self.document.find(id))
            .map(|e| e.points())
            .collect();
        let mut changed = false;
        for (a, &id) in ids.iter().enumerate() {
            // Every intersection of path `a` with every other path, keyed
            // by the segment it splits and its position along it.
            let mut hits: Vec<(usize, f64, Point)> = Vec::new();
            let pa = &polylines[a];
            for (b, pb) in polylines.iter().enumerate() {
                if a == b {
                    continue;
                }
                for i in 0..pa.len().saturating_sub(1) {
                    for j in 0..pb.len().saturating_sub(1) {
                        if let Some(hit) =
                            segment_intersection(pa[i], pa[i + 1], pb[j], pb[j + 1])
                        {
                            if hit.distance_to(&pa[i]) > 1e-9 && hit.distance_to(&pa[i + 1]) > 1e-9
                            {
                                hits.push((i, hit.distance_to(&pa[i]), hit));
                            }
                        }
                    }
                }
            }
            if hits.is_empty() {
                continue;
            }
            // Insert from the back so earlier segment indices stay valid;
            // within one segment, nearest-first keeps order along the path.
            hits.sort_by(|x, y| {
                y.0.cmp(&x.0)
                    .then(y.1.partial_cmp(&x.1).expect("finite distance"))
            });
            if let Some(element) = self.document.find_mut(id) {
                for (segment, _, hit) in hits {
                    if element.insert_point(segment + 1, hit) {
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    fn cmd_add_points_at_half(&mut self) -> bool {
        match self.target() {
            Target::Points(id, indices) => {
                if indices.len() < 2 {
                    return false;
                }
                let Some(element) = self.document.find_mut(id) else {
                    return false;
                };
                let mut changed = false;
                // Consecutive selected handles get a midpoint between them.
                for pair in indices.windows(2).rev() {
                    if pair[1] != pair[0] + 1 {
                        continue;
                    }
                    let (Some(a), Some(b)) = (element.point(pair[0]), element.point(pair[1]))
                    else {
                        continue;
                    };
                    if element.insert_point(pair[1], a.midpoint(&b)) {
                        changed = true;
                    }
                }
                changed
            }
            Target::Elements(ids) => {
                let mut changed = false;
                for id in ids {
                    let Some(element) = self.document.find_mut(id) else {
                        continue;
                    };
                    if !matches!(element.kind, ElementKind::Path(_)) {
                        continue;
                    }
                    for index in (1..element.point_count()).rev() {
                        let (Some(a), Some(b)) = (element.point(index - 1), element.point(index))
                        else {
                            continue;
                        };
                        if element.insert_point(index, a.midpoint(&b)) {
                            changed = true;
                        }
                    }
                }
                changed
            }
            Target::Nothing => false,
        }
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    fn cmd_copy(&mut self) -> bool {
        match self.target() {
            Target::Points(id, indices) => {
                let Some(element) = self.document.find(id) else {
                    return false;
                };
                let points: Vec<Point> = indices.iter().filter_map(|&i| element.point(i)).collect();
                if points.is_empty() {
                    return false;
                }
                self.session.clipboard = Some(Element::new(
                    "Clipboard",
                    ElementKind::Path(PathData::from_points(&points)),
                ));
                true
            }
            Target::Elements(ids) => {
                let mut clones: Vec<Element> = ids
                    .iter()
                    .filter_map(|&id| self.document.find(id).cloned())
                    .collect();
                if clones.is_empty() {
                    return false;
                }
                self.session.clipboard = Some(if clones.len() == 1 {
                    clones.pop().expect("one element")
                } else {
                    let mut wrapper = Element::group("Clipboard");
                    *wrapper.children_mut().expect("group") = clones;
                    wrapper
                });
                true
            }
            Target::Nothing => false,
        }
    }

    fn cmd_cut(&mut self) -> bool {
        self.cmd_copy() && self.cmd_delete()
    }

    fn cmd_paste(&mut self) -> bool {
        let Some(clipboard) = self.session.clipboard.clone() else {
            return false;
        };
        match self.edit.state() {
            EditState::PointEditing { element } => {
                // Pasting points splices them in after the last selected
                // handle and selects exactly the pasted points.
                let pasted = clipboard.points();
                if pasted.is_empty() {
                    return false;
                }
                let selected = self.edit.selected_points();
                let Some(target) = self.document.find_mut(element) else {
                    return false;
                };
                let at = selected
                    .last()
                    .map(|&i| i + 1)
                    .unwrap_or_else(|| target.point_count());
                for (offset, &p) in pasted.iter().enumerate() {
                    if !target.insert_point(at + offset, p) {
                        return false;
                    }
                }
                self.edit.set_selected_points(at..at + pasted.len());
                true
            }
            EditState::Browsing { group } => {
                // Clipboard content is always re-inserted with fresh ids.
                let element = clipboard.with_regenerated_ids();
                match self.document.insert_child(group, None, element) {
                    Ok(id) => {
                        self.edit.set_selected_elements(vec![id]);
                        true
                    }
                    Err(_) => false,
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Interactive gestures
    // ------------------------------------------------------------------

    fn begin_gesture(&mut self, op: PendingOperation) {
        self.pending = Some(Gesture {
            op,
            before: self.document.clone(),
            before_focus: self.edit.focus(),
        });
    }

    /// Starts dragging the current selection. Fails without a selection.
    pub fn begin_move(&mut self, anchor: Point) -> bool {
        if matches!(self.target(), Target::Nothing) {
            return false;
        }
        self.begin_gesture(PendingOperation::Move { anchor, last: anchor });
        true
    }

    pub fn begin_rotate(&mut self, origin: Point, anchor: Point) -> bool {
        if matches!(self.target(), Target::Nothing) {
            return false;
        }
        self.begin_gesture(PendingOperation::Rotate {
            origin,
            anchor,
            last_angle: 0.0,
        });
        true
    }

    pub fn begin_scale(&mut self, origin: Point, anchor: Point, uniform: bool) -> bool {
        if matches!(self.target(), Target::Nothing) || origin.distance_to(&anchor) < 1e-9 {
            return false;
        }
        self.begin_gesture(PendingOperation::Scale {
            origin,
            anchor,
            uniform,
            last_ratio: (1.0, 1.0),
        });
        true
    }

    /// Starts click-by-click polyline entry with its first point.
    pub fn begin_path(&mut self, first: Point) -> bool {
        let Some(group) = self.edit.edited_group() else {
            return false;
        };
        let before = self.document.clone();
        let before_focus = self.edit.focus();
        let element = Element::new(
            "Path",
            ElementKind::Path(PathData::from_points(&[first])),
        );
        let Ok(id) = self.document.insert_child(group, None, element) else {
            return false;
        };
        self.pending = Some(Gesture {
            op: PendingOperation::DrawPath { element: id },
            before,
            before_focus,
        });
        true
    }

    /// Feeds a pointer coordinate to the pending gesture. Intermediate
    /// updates mutate the document but never checkpoint.
    pub fn pointer(&mut self, p: Point) -> GestureOutcome {
        let Some(mut gesture) = self.pending.take() else {
            return GestureOutcome::Cancelled;
        };
        match &mut gesture.op {
            PendingOperation::Move { last, .. } => {
                let (dx, dy) = (p.x - last.x, p.y - last.y);
                self.transform_selection(|q| Point::new(q.x + dx, q.y + dy));
                *last = p;
            }
            PendingOperation::Rotate {
                origin,
                anchor,
                last_angle,
            } => {
                let total =
                    (origin.angle_to(&p) - origin.angle_to(anchor)).to_degrees();
                let delta = total - *last_angle;
                let o = *origin;
                self.transform_selection(|q| rotate_point(q, o, delta));
                *last_angle = total;
            }
            PendingOperation::Scale {
                origin,
                anchor,
                uniform,
                last_ratio,
            } => {
                let o = *origin;
                let (rx, ry) = if *uniform {
                    let r = o.distance_to(&p) / o.distance_to(anchor).max(1e-9);
                    (r, r)
                } else {
                    let rx = safe_ratio(p.x - o.x, anchor.x - o.x);
                    let ry = safe_ratio(p.y - o.y, anchor.y - o.y);
                    (rx, ry)
                };
                let (ix, iy) = (rx / last_ratio.0.max(1e-9), ry / last_ratio.1.max(1e-9));
                self.transform_selection(|q| scale_point(q, o, ix, iy));
                *last_ratio = (rx, ry);
            }
            PendingOperation::DrawPath { element } => {
                let id = *element;
                if let Some(target) = self.document.find_mut(id) {
                    let at = target.point_count();
                    target.insert_point(at, p);
                }
            }
        }
        self.pending = Some(gesture);
        GestureOutcome::InProgress
    }

    /// Completes the pending gesture with exactly one checkpoint. A draw
    /// gesture that never got a second point is pruned and reported as
    /// cancelled.
    pub fn commit_gesture(&mut self) -> GestureOutcome {
        let Some(gesture) = self.pending.take() else {
            return GestureOutcome::Cancelled;
        };
        if let PendingOperation::DrawPath { element } = gesture.op {
            let degenerate = self
                .document
                .find(element)
                .map(|e| e.point_count() < 2)
                .unwrap_or(true);
            if degenerate {
                self.document = gesture.before;
                self.edit.refocus(&self.document, gesture.before_focus);
                return GestureOutcome::Cancelled;
            }
            self.edit.set_selected_elements(vec![element]);
        }
        self.commit();
        GestureOutcome::Committed
    }

    /// Rolls the document back to the pre-gesture snapshot. No checkpoint.
    pub fn cancel_gesture(&mut self) -> GestureOutcome {
        let Some(gesture) = self.pending.take() else {
            return GestureOutcome::Cancelled;
        };
        self.document = gesture.before;
        self.edit.refocus(&self.document, gesture.before_focus);
        GestureOutcome::Cancelled
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

fn align_target(action: Action, p: Point, bounds: &Bounds) -> Point {
    match action {
        Action::AlignLeft => Point::new(bounds.min_x, p.y),
        Action::AlignRight => Point::new(bounds.max_x, p.y),
        Action::AlignTop => Point::new(p.x, bounds.max_y),
        Action::AlignBottom => Point::new(p.x, bounds.min_y),
        Action::AlignCenterX => Point::new(bounds.center().x, p.y),
        Action::AlignCenterY => Point::new(p.x, bounds.center().y),
        _ => p,
    }
}

fn safe_ratio(num: f64, den: f64) -> f64 {
    if den.abs() < 1e-9 {
        1.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench_with_paths(paths: &[&[Point]]) -> (Workbench, Vec<ElementId>) {
        let mut bench = Workbench::new();
        let root = bench.document.root_id();
        let mut ids = Vec::new();
        for (i, points) in paths.iter().enumerate() {
            let element = Element::new(
                format!("p{i}"),
                ElementKind::Path(PathData::from_points(points)),
            );
            ids.push(bench.document.insert_child(root, None, element).unwrap());
        }
        bench.history.reset(&bench.document, root);
        (bench, ids)
    }

    fn square(x: f64, y: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
            Point::new(x, y),
        ]
    }

    #[test]
    fn empty_selection_commands_are_no_ops() {
        let mut bench = Workbench::new();
        let payload = CommandPayload {
            vector: Some(Point::new(1.0, 0.0)),
            ..CommandPayload::default()
        };
        assert!(!bench.execute(Action::Move, 0.0, &payload));
        assert!(!bench.execute(Action::Group, 0.0, &CommandPayload::default()));
        assert!(!bench.history.can_undo());
    }

    #[test]
    fn move_translates_and_checkpoints() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        let payload = CommandPayload {
            vector: Some(Point::new(3.0, 4.0)),
            ..CommandPayload::default()
        };
        assert!(bench.execute(Action::Move, 0.0, &payload));
        let element = bench.document.find(ids[0]).unwrap();
        assert_eq!(element.point(0), Some(Point::new(3.0, 4.0)));
        assert!(bench.document.dirty);
        assert!(bench.history.can_undo());
    }

    #[test]
    fn four_quarter_turns_restore_the_bounding_box() {
        let sq = square(2.0, 3.0, 5.0);
        let (mut bench, ids) = bench_with_paths(&[&sq]);
        bench.edit.set_selected_elements(ids.clone());
        let before = bench.document.find(ids[0]).unwrap().bounds().unwrap();
        let payload = CommandPayload {
            from_center: true,
            ..CommandPayload::default()
        };
        for _ in 0..4 {
            assert!(bench.execute(Action::Rotate, 90.0, &payload));
        }
        let after = bench.document.find(ids[0]).unwrap().bounds().unwrap();
        assert!((before.min_x - after.min_x).abs() < 1e-6);
        assert!((before.min_y - after.min_y).abs() < 1e-6);
        assert!((before.max_x - after.max_x).abs() < 1e-6);
        assert!((before.max_y - after.max_y).abs() < 1e-6);
    }

    #[test]
    fn scale_locks_aspect_for_arcs() {
        let mut bench = Workbench::new();
        let root = bench.document.root_id();
        let arc = Element::new(
            "a",
            ElementKind::Arc(crate::model::ArcData::circle(Point::new(0.0, 0.0), 5.0)),
        );
        let id = bench.document.insert_child(root, None, arc).unwrap();
        bench.edit.set_selected_elements(vec![id]);
        let payload = CommandPayload {
            vector: Some(Point::new(2.0, 3.0)),
            origin: Some(Point::new(0.0, 0.0)),
            ..CommandPayload::default()
        };
        assert!(bench.execute(Action::Scale, 0.0, &payload));
        let ElementKind::Arc(arc) = &bench.document.find(id).unwrap().kind else {
            panic!("expected arc");
        };
        // Larger magnitude (3.0) wins on both axes.
        assert!((arc.radius - 15.0).abs() < 1e-9);
    }

    #[test]
    fn group_then_ungroup_restores_children() {
        let (mut bench, ids) = bench_with_paths(&[
            &[Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
            &[Point::new(2.0, 0.0), Point::new(3.0, 0.0)],
        ]);
        bench.edit.set_selected_elements(ids.clone());
        assert!(bench.execute(Action::Group, 0.0, &CommandPayload::default()));
        let group_id = bench.edit.selected_elements()[0];
        let group = bench.document.find(group_id).unwrap();
        assert_eq!(group.children().unwrap().len(), 2);

        assert!(bench.execute(Action::Ungroup, 0.0, &CommandPayload::default()));
        assert!(!bench.document.contains(group_id));
        for id in ids {
            assert!(bench.document.contains(id));
        }
    }

    #[test]
    fn extract_promotes_one_level_up() {
        let mut bench = Workbench::new();
        let root = bench.document.root_id();
        let group_id = bench
            .document
            .insert_child(root, None, Element::group("g"))
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            let p = Element::new(
                format!("p{i}"),
                ElementKind::Path(PathData::from_points(&[
                    Point::new(i as f64, 0.0),
                    Point::new(i as f64, 1.0),
                ])),
            );
            ids.push(bench.document.insert_child(group_id, None, p).unwrap());
        }
        bench.open(group_id).unwrap();
        bench.edit.set_selected_elements(ids[..2].to_vec());
        assert!(bench.execute(Action::Extract, 0.0, &CommandPayload::default()));

        let group = bench.document.find(group_id).unwrap();
        assert_eq!(group.children().unwrap().len(), 3);
        let root_children = bench.document.root.children().unwrap();
        assert_eq!(root_children.len(), 2);
        let extracted = root_children.last().unwrap();
        assert_eq!(extracted.children().unwrap().len(), 2);
    }

    #[test]
    fn paste_into_point_editing_selects_the_pasted_points() {
        let (mut bench, ids) = bench_with_paths(&[
            &[Point::new(0.0, 0.0)],
            &[Point::new(5.0, 5.0), Point::new(6.0, 5.0)],
        ]);
        bench.edit.set_selected_elements(vec![ids[1]]);
        assert!(bench.execute(Action::Copy, 0.0, &CommandPayload::default()));

        bench.open(ids[0]).unwrap();
        assert!(bench.execute(Action::Paste, 0.0, &CommandPayload::default()));
        let element = bench.document.find(ids[0]).unwrap();
        assert_eq!(element.point_count(), 3);
        assert_eq!(bench.edit.selected_points(), vec![1, 2]);
    }

    #[test]
    fn duplicate_keeps_the_original_by_default() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        let payload = CommandPayload {
            vector: Some(Point::new(10.0, 0.0)),
            ..CommandPayload::default()
        };
        assert!(bench.execute(Action::Duplicate, 0.0, &payload));
        assert!(bench.document.contains(ids[0]));
        assert_eq!(bench.document.root.children().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_can_replace_the_originals() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        let payload = CommandPayload {
            copies: 1,
            keep_original: false,
            vector: Some(Point::new(10.0, 0.0)),
            ..CommandPayload::default()
        };
        assert!(bench.execute(Action::Duplicate, 0.0, &payload));
        assert!(!bench.document.contains(ids[0]));
        let children = bench.document.root.children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].point(0), Some(Point::new(10.0, 0.0)));
    }

    #[test]
    fn point_selection_rejects_copy_transforms() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.open(ids[0]).unwrap();
        bench.edit.set_selected_points([0]);
        let before = bench.document.clone();
        let payload = CommandPayload {
            copies: 2,
            vector: Some(Point::new(1.0, 0.0)),
            ..CommandPayload::default()
        };
        assert!(!bench.execute(Action::Move, 0.0, &payload));
        assert_eq!(bench.document, before);
        assert!(!bench.document.dirty);
        assert!(!bench.history.can_undo());
    }

    #[test]
    fn undo_redo_round_trips_document_and_focus() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        let payload = CommandPayload {
            vector: Some(Point::new(1.0, 1.0)),
            ..CommandPayload::default()
        };
        assert!(bench.execute(Action::Move, 0.0, &payload));
        assert!(bench.execute(Action::Move, 0.0, &payload));
        let after = bench.document.clone();

        assert!(bench.undo());
        assert!(bench.undo());
        assert!(!bench.undo());
        assert_eq!(
            bench.document.find(ids[0]).unwrap().point(0),
            Some(Point::new(0.0, 0.0))
        );

        assert!(bench.redo());
        assert!(bench.redo());
        assert!(!bench.redo());
        assert_eq!(bench.document, after);
    }

    #[test]
    fn join_command_merges_touching_paths() {
        let (mut bench, ids) = bench_with_paths(&[
            &[Point::new(0.0, 0.0), Point::new(5.0, 0.0)],
            &[Point::new(5.0, 0.0), Point::new(5.0, 5.0)],
        ]);
        bench.edit.set_selected_elements(ids.clone());
        assert!(bench.execute(Action::Join, 0.01, &CommandPayload::default()));
        assert_eq!(bench.document.root.children().unwrap().len(), 1);
        let joined = &bench.document.root.children().unwrap()[0];
        assert_eq!(joined.point_count(), 3);
    }

    #[test]
    fn cancelled_gesture_rolls_back_without_checkpoint() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        assert!(bench.begin_move(Point::new(0.0, 0.0)));
        bench.pointer(Point::new(3.0, 3.0));
        bench.pointer(Point::new(6.0, 2.0));
        assert_eq!(bench.cancel_gesture(), GestureOutcome::Cancelled);
        assert_eq!(
            bench.document.find(ids[0]).unwrap().point(0),
            Some(Point::new(0.0, 0.0))
        );
        assert!(!bench.history.can_undo());
    }

    #[test]
    fn committed_gesture_checkpoints_once() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]]);
        bench.edit.set_selected_elements(ids.clone());
        let depth = bench.history.depth();
        assert!(bench.begin_move(Point::new(0.0, 0.0)));
        bench.pointer(Point::new(1.0, 0.0));
        bench.pointer(Point::new(2.0, 0.0));
        bench.pointer(Point::new(3.0, 0.0));
        assert_eq!(bench.commit_gesture(), GestureOutcome::Committed);
        assert_eq!(bench.history.depth(), depth + 1);
        assert_eq!(
            bench.document.find(ids[0]).unwrap().point(0),
            Some(Point::new(3.0, 0.0))
        );
    }

    #[test]
    fn draw_gesture_with_one_point_is_pruned() {
        let mut bench = Workbench::new();
        let count = bench.document.element_count();
        assert!(bench.begin_path(Point::new(0.0, 0.0)));
        assert_eq!(bench.commit_gesture(), GestureOutcome::Cancelled);
        assert_eq!(bench.document.element_count(), count);
    }

    #[test]
    fn pocket_requires_a_closed_outline() {
        let (mut bench, ids) = bench_with_paths(&[&[Point::new(0.0, 0.0), Point::new(5.0, 0.0)]]);
        bench.edit.set_selected_elements(ids);
        assert!(!bench.execute(Action::Pocket, 1.0, &CommandPayload::default()));

        let sq = square(0.0, 0.0, 10.0);
        let (mut bench, ids) = bench_with_paths(&[&sq]);
        bench.edit.set_selected_elements(ids.clone());
        assert!(bench.execute(Action::Pocket, 1.0, &CommandPayload::default()));
        let pocket_id = bench.edit.selected_elements()[0];
        let ElementKind::Pocket(pocket) = &bench.document.find(pocket_id).unwrap().kind else {
            panic!("expected pocket");
        };
        assert!(!pocket.rings.is_empty());
        assert!(bench.document.find(pocket_id).unwrap().properties.all_at_once);
    }

    #[test]
    fn unparseable_parameter_never_mutates() {
        let sq = square(0.0, 0.0, 10.0);
        let (mut bench, ids) = bench_with_paths(&[&sq]);
        bench.edit.set_selected_elements(ids);
        assert!(!bench.execute_parsed(Action::Pocket, "not a number", &CommandPayload::default()));
        assert!(!bench.document.dirty);
        assert!(!bench.history.can_undo());
    }

    #[test]
    fn view_toggles_skip_the_history() {
        let mut bench = Workbench::new();
        assert!(bench.execute(Action::ToggleGridSnap, 0.0, &CommandPayload::default()));
        assert!(bench.session.grid.snap_enabled);
        assert!(!bench.history.can_undo());
        assert!(!bench.document.dirty);
    }
}
