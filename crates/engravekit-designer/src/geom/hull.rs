//! Convex hull by Jarvis march (gift wrapping).

use engravekit_core::geometry::cross;
use engravekit_core::{DesignError, Point, Result};

/// Computes the convex hull of `points` by Jarvis march.
///
/// Collinear points are treated as interior: only the extreme vertices of
/// each hull edge appear in the output. The hull is returned
/// counter-clockwise, starting from the lowest-leftmost point, not closed.
pub fn convex_hull(points: &[Point]) -> Result<Vec<Point>> {
    let distinct = distinct_points(points);
    if distinct.len() < 3 {
        return Err(DesignError::degenerate(format!(
            "convex hull needs at least 3 distinct points, got {}",
            distinct.len()
        )));
    }

    // Lowest point, leftmost on ties: guaranteed on the hull.
    let start = *distinct
        .iter()
        .min_by(|a, b| {
            (a.y, a.x)
                .partial_cmp(&(b.y, b.x))
                .expect("finite coordinates")
        })
        .expect("non-empty");

    let mut hull = Vec::new();
    let mut current = start;
    loop {
        hull.push(current);
        let mut candidate = distinct[0];
        for &p in &distinct[1..] {
            if candidate == current {
                candidate = p;
                continue;
            }
            let turn = cross(current, candidate, p);
            let farther = current.distance_to(&p) > current.distance_to(&candidate);
            // Clockwise turn means p is outside the current wrap; on ties
            // (collinear) prefer the far point so midpoints stay interior.
            if turn < 0.0 || (turn.abs() < 1e-12 && farther) {
                candidate = p;
            }
        }
        if candidate == start {
            break;
        }
        current = candidate;
        if hull.len() > distinct.len() {
            // All points collinear never reaches here; guard against
            // numeric loops regardless.
            return Err(DesignError::degenerate("hull did not close"));
        }
    }

    if hull.len() < 3 {
        return Err(DesignError::degenerate("all points are collinear"));
    }
    Ok(hull)
}

fn distinct_points(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if !out.iter().any(|q| q.distance_to(&p) < 1e-9) {
            out.push(p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_hull_drops_interior_and_collinear() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 5.0),  // interior
            Point::new(5.0, 0.0),  // collinear on the bottom edge
            Point::new(10.0, 5.0), // collinear on the right edge
        ];
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.len(), 4);
        assert!(hull.contains(&Point::new(0.0, 0.0)));
        assert!(hull.contains(&Point::new(10.0, 0.0)));
        assert!(hull.contains(&Point::new(10.0, 10.0)));
        assert!(hull.contains(&Point::new(0.0, 10.0)));
    }

    #[test]
    fn collinear_input_is_degenerate() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
        ];
        assert!(convex_hull(&points).is_err());
    }

    #[test]
    fn too_few_points_is_degenerate() {
        assert!(convex_hull(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).is_err());
    }
}
