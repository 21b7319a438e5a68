//! Pointer snapping: resolves a raw world coordinate to the best candidate
//! in priority order (reference cursor, machine head, nearest document
//! point, grid intersection, raw input).

use engravekit_core::Point;

use crate::model::{Document, ExcludeSet};
use crate::session::SessionContext;

/// Grid configuration. The effective step auto-scales by powers of ten so
/// its on-screen spacing stays inside a pixel band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    pub snap_enabled: bool,
    /// Step in world units at zoom 1.
    pub base_step: f64,
    /// Smallest acceptable on-screen spacing, in pixels.
    pub min_pixel_spacing: f64,
    /// Largest acceptable on-screen spacing, in pixels.
    pub max_pixel_spacing: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            snap_enabled: false,
            base_step: 1.0,
            min_pixel_spacing: 8.0,
            max_pixel_spacing: 80.0,
        }
    }
}

impl GridSettings {
    /// Effective world-space step at `zoom` (pixels per world unit).
    pub fn step(&self, zoom: f64) -> f64 {
        let mut step = self.base_step;
        while step * zoom < self.min_pixel_spacing {
            step *= 10.0;
        }
        while step * zoom > self.max_pixel_spacing && step > 1e-9 {
            step /= 10.0;
        }
        step
    }

    /// Nearest grid intersection to `p` at `zoom`.
    pub fn nearest(&self, p: Point, zoom: f64) -> Point {
        let step = self.step(zoom);
        Point::new((p.x / step).round() * step, (p.y / step).round() * step)
    }
}

/// Snap candidate resolver. The tolerance radius is screen-space and is
/// divided by the current zoom to get a world-space radius.
#[derive(Debug, Clone, Copy)]
pub struct SnapResolver {
    pub screen_tolerance: f64,
}

impl Default for SnapResolver {
    fn default() -> Self {
        Self {
            screen_tolerance: 10.0,
        }
    }
}

impl SnapResolver {
    /// Resolves `query` against the candidates in priority order. With no
    /// candidate in range and grid snap off, the input comes back unchanged.
    pub fn resolve(
        &self,
        document: &Document,
        session: &SessionContext,
        query: Point,
        exclude: &ExcludeSet,
    ) -> Point {
        let radius = self.screen_tolerance / session.zoom.max(1e-6);

        if let Some(cursor) = session.cursor {
            if cursor.distance_to(&query) <= radius {
                return cursor;
            }
        }
        if session.machine_visible {
            if let Some(head) = session.machine_position {
                if head.distance_to(&query) <= radius {
                    return head;
                }
            }
        }
        if let Some((_, _, p)) = document.closest_point(query, exclude) {
            if p.distance_to(&query) <= radius {
                return p;
            }
        }
        if session.grid.snap_enabled {
            return session.grid.nearest(query, session.zoom);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, ElementKind, PathData};

    fn doc_with_point_at(p: Point) -> Document {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.insert_child(
            root,
            None,
            Element::new(
                "p",
                ElementKind::Path(PathData::from_points(&[p, Point::new(p.x + 50.0, p.y)])),
            ),
        )
        .unwrap();
        doc
    }

    #[test]
    fn cursor_outranks_document_points() {
        let doc = doc_with_point_at(Point::new(0.5, 0.0));
        let mut session = SessionContext::new();
        session.cursor = Some(Point::new(0.0, 0.5));
        let resolver = SnapResolver::default();
        let hit = resolver.resolve(&doc, &session, Point::new(0.0, 0.0), &ExcludeSet::default());
        assert_eq!(hit, Point::new(0.0, 0.5));
    }

    #[test]
    fn hidden_machine_head_is_not_a_candidate() {
        let doc = Document::new();
        let mut session = SessionContext::new();
        session.update_machine_position(Point::new(1.0, 1.0), false);
        let resolver = SnapResolver::default();
        let query = Point::new(0.0, 0.0);
        assert_eq!(
            resolver.resolve(&doc, &session, query, &ExcludeSet::default()),
            query
        );
    }

    #[test]
    fn out_of_range_query_is_unchanged() {
        let doc = doc_with_point_at(Point::new(100.0, 100.0));
        let session = SessionContext::new();
        let resolver = SnapResolver::default();
        let query = Point::new(0.0, 0.0);
        assert_eq!(
            resolver.resolve(&doc, &session, query, &ExcludeSet::default()),
            query
        );
    }

    #[test]
    fn grid_snap_catches_the_leftovers() {
        let doc = Document::new();
        let mut session = SessionContext::new();
        session.grid.snap_enabled = true;
        session.set_zoom(10.0);
        let resolver = SnapResolver::default();
        let hit = resolver.resolve(
            &doc,
            &session,
            Point::new(3.4, 6.7),
            &ExcludeSet::default(),
        );
        // base_step 1.0 at zoom 10 gives 10px spacing, inside the band.
        assert_eq!(hit, Point::new(3.0, 7.0));
    }

    #[test]
    fn grid_step_scales_by_powers_of_ten() {
        let grid = GridSettings::default();
        assert_eq!(grid.step(1.0), 10.0);
        assert_eq!(grid.step(100.0), 0.1);
    }
}
