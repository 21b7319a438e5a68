//! Polygon offsetting for the inner/outer offset-cut command.
//!
//! Built on `cavalier_contours` parallel offsetting and booleans. Result
//! contours are classified inner vs outer by bounding-box containment
//! against the original selection bounds, not by area topology; that is a
//! documented limitation of the original behavior and is kept as such.

use cavalier_contours::polyline::{
    BooleanOp, PlineSource, PlineSourceMut, PlineVertex, Polyline,
};

use engravekit_core::{Bounds, DesignError, Point, Result};

use crate::model::PathData;

/// Which side of the outline the offset-cut keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSide {
    /// Contours fully inside the original selection bounds.
    Inner,
    /// Everything else.
    Outer,
}

/// Offsets every closed outline in `outlines` by ±`distance`, unions the
/// results, and keeps the contours on the requested side.
///
/// Each input outline is a sampled closed polygon (first point repeated or
/// not; both accepted). Output paths are closed.
pub fn offset_contours(
    outlines: &[Vec<Point>],
    distance: f64,
    side: OffsetSide,
) -> Result<Vec<PathData>> {
    if distance.abs() < 1e-9 {
        return Err(DesignError::degenerate("zero offset distance"));
    }
    let polygons: Vec<Polyline<f64>> = outlines
        .iter()
        .filter(|o| o.len() >= 3)
        .map(|o| prepare_polygon(o))
        .collect();
    if polygons.is_empty() {
        return Err(DesignError::degenerate("no closed outline to offset"));
    }

    let selection_bounds = outlines
        .iter()
        .flatten()
        .fold(None::<Bounds>, |acc, &p| match acc {
            Some(mut b) => {
                b.expand(p);
                Some(b)
            }
            None => Some(Bounds::from_point(p)),
        })
        .expect("outlines are non-empty");

    // Offset both ways; each direction is unioned on its own so the inward
    // and outward rings of one outline are never merged into each other.
    let mut contours: Vec<Polyline<f64>> = Vec::new();
    for offset in [distance.abs(), -distance.abs()] {
        let mut same_direction = Vec::new();
        for polygon in &polygons {
            same_direction.extend(polygon.parallel_offset(offset));
        }
        contours.extend(union_all(same_direction));
    }

    let mut kept = Vec::new();
    for contour in contours {
        let points: Vec<Point> = contour
            .vertex_data
            .iter()
            .map(|v| Point::new(v.x, v.y))
            .collect();
        if points.len() < 3 {
            continue;
        }
        let contour_bounds = Bounds::from_points(&points).expect("non-empty contour");
        let is_inner = selection_bounds.contains(&contour_bounds);
        let keep = match side {
            OffsetSide::Inner => is_inner,
            OffsetSide::Outer => !is_inner,
        };
        if keep {
            kept.push(PathData::closed_from_points(&points));
        }
    }

    if kept.is_empty() {
        return Err(DesignError::degenerate(format!(
            "offset by {distance} produced no contour on the requested side"
        )));
    }
    Ok(kept)
}

/// Builds a clean clockwise closed polyline from sampled points, the
/// orientation `parallel_offset` expects for negative-is-inward.
pub(crate) fn prepare_polygon(points: &[Point]) -> Polyline<f64> {
    let mut clean: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if clean
            .last()
            .map(|q| q.distance_to(&p) > 1e-9)
            .unwrap_or(true)
        {
            clean.push(p);
        }
    }
    // Drop a repeated closing point; the polyline closes itself.
    if clean.len() > 1 {
        let (first, last) = (clean[0], *clean.last().expect("non-empty"));
        if first.distance_to(&last) < 1e-9 {
            clean.pop();
        }
    }

    let mut signed_area = 0.0;
    for i in 0..clean.len() {
        let p1 = clean[i];
        let p2 = clean[(i + 1) % clean.len()];
        signed_area += p1.x * p2.y - p2.x * p1.y;
    }
    if signed_area > 0.0 {
        clean.reverse();
    }

    let mut polyline = Polyline::new();
    for p in clean {
        polyline.add_vertex(PlineVertex::new(p.x, p.y, 0.0));
    }
    polyline.set_is_closed(true);
    polyline
}

/// Pairwise-unions overlapping contours into a disjoint set. Contours whose
/// bounds nest are distinct rings, not overlaps, and stay separate.
fn union_all(contours: Vec<Polyline<f64>>) -> Vec<Polyline<f64>> {
    let mut merged: Vec<Polyline<f64>> = Vec::new();
    'next: for contour in contours {
        for i in 0..merged.len() {
            if nested_bounds(&merged[i], &contour) {
                continue;
            }
            let result = merged[i].boolean(&contour, BooleanOp::Or);
            if result.pos_plines.len() == 1 && result.neg_plines.is_empty() {
                // Overlapping: replace with the union.
                merged[i] = result
                    .pos_plines
                    .into_iter()
                    .next()
                    .expect("one positive pline")
                    .pline;
                continue 'next;
            }
        }
        merged.push(contour);
    }
    merged
}

fn nested_bounds(a: &Polyline<f64>, b: &Polyline<f64>) -> bool {
    match (contour_bounds(a), contour_bounds(b)) {
        (Some(a), Some(b)) => a.contains(&b) || b.contains(&a),
        _ => false,
    }
}

fn contour_bounds(pline: &Polyline<f64>) -> Option<Bounds> {
    let mut vertices = pline.vertex_data.iter().map(|v| Point::new(v.x, v.y));
    let mut bounds = Bounds::from_point(vertices.next()?);
    for p in vertices {
        bounds.expand(p);
    }
    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
            Point::new(0.0, 0.0),
        ]
    }

    #[test]
    fn inner_offset_shrinks_outer_grows() {
        let outlines = vec![square(10.0)];
        let inner = offset_contours(&outlines, 2.0, OffsetSide::Inner).unwrap();
        assert_eq!(inner.len(), 1);
        let b = Bounds::from_points(&inner[0].positions()).unwrap();
        assert!((b.width() - 6.0).abs() < 1e-6);

        let outer = offset_contours(&outlines, 2.0, OffsetSide::Outer).unwrap();
        assert_eq!(outer.len(), 1);
        let b = Bounds::from_points(&outer[0].positions()).unwrap();
        assert!(b.width() > 10.0);
    }

    #[test]
    fn nested_outlines_keep_distinct_inner_rings() {
        let outer: Vec<Point> = square(20.0);
        let inset: Vec<Point> = square(10.0)
            .into_iter()
            .map(|p| Point::new(p.x + 5.0, p.y + 5.0))
            .collect();
        let inner = offset_contours(&[outer, inset], 2.0, OffsetSide::Inner).unwrap();
        let widths: Vec<f64> = inner
            .iter()
            .map(|p| Bounds::from_points(&p.positions()).unwrap().width())
            .collect();
        assert!(widths.iter().any(|w| (w - 16.0).abs() < 1e-6));
        assert!(widths.iter().any(|w| (w - 6.0).abs() < 1e-6));
    }

    #[test]
    fn oversized_inner_offset_is_degenerate() {
        let outlines = vec![square(10.0)];
        assert!(offset_contours(&outlines, 6.0, OffsetSide::Inner).is_err());
    }

    #[test]
    fn zero_distance_is_degenerate() {
        assert!(offset_contours(&[square(10.0)], 0.0, OffsetSide::Inner).is_err());
    }
}
