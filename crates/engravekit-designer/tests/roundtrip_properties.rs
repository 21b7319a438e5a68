//! Property tests over the save format and the geometry helpers.

use std::collections::HashSet;

use proptest::prelude::*;

use engravekit_designer::geom::{convex_hull, simplify_by_distance};
use engravekit_designer::import::import_gcode_str;
use engravekit_designer::model::Document;
use engravekit_designer::{save_to_string, Element, ElementKind, PathData, Point};

fn coords() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-500.0..500.0f64, -500.0..500.0f64), 2..24)
}

fn to_points(coords: &[(f64, f64)]) -> Vec<Point> {
    coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
}

proptest! {
    /// Any feed polyline survives a save/import cycle with every
    /// coordinate intact to the format's six decimals.
    #[test]
    fn polyline_round_trips_through_the_project_format(coords in coords()) {
        let points = to_points(&coords);
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.insert_child(
            root,
            None,
            Element::new("p", ElementKind::Path(PathData::from_points(&points))),
        )
        .unwrap();

        let text = save_to_string(&doc).unwrap();
        let report = import_gcode_str(&text).unwrap();
        prop_assert_eq!(report.skipped, 0);
        let children = report.document.root.children().unwrap();
        prop_assert_eq!(children.len(), 1);
        let restored = children[0].points();
        prop_assert_eq!(restored.len(), points.len());
        for (p, q) in points.iter().zip(&restored) {
            prop_assert!(p.distance_to(q) < 2e-6);
        }
    }

    /// Reversing twice is the identity, tags included.
    #[test]
    fn double_reverse_is_identity(coords in coords()) {
        let points = to_points(&coords);
        let mut element =
            Element::new("p", ElementKind::Path(PathData::from_points(&points)));
        let before = element.clone();
        element.reverse();
        element.reverse();
        prop_assert_eq!(element.kind, before.kind);
    }

    /// Distance simplification never adds points and always keeps both
    /// endpoints in place.
    #[test]
    fn simplify_by_distance_shrinks_and_keeps_endpoints(
        coords in coords(),
        min_distance in 0.01..50.0f64,
    ) {
        let points = to_points(&coords);
        let simplified = simplify_by_distance(&points, min_distance, &HashSet::new());
        prop_assert!(simplified.len() <= points.len());
        prop_assert!(simplified.len() >= 2);
        prop_assert_eq!(simplified[0], points[0]);
        prop_assert_eq!(*simplified.last().unwrap(), *points.last().unwrap());
    }

    /// Every input point lies inside (or on) its own convex hull.
    #[test]
    fn hull_contains_its_inputs(coords in prop::collection::vec(
        (-100.0..100.0f64, -100.0..100.0f64),
        3..40,
    )) {
        let points = to_points(&coords);
        let Ok(hull) = convex_hull(&points) else {
            // Degenerate inputs (collinear or coincident) are rejected.
            return Ok(());
        };
        for p in &points {
            for i in 0..hull.len() {
                let a = hull[i];
                let b = hull[(i + 1) % hull.len()];
                let turn = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
                prop_assert!(turn >= -1e-6);
            }
        }
    }
}
