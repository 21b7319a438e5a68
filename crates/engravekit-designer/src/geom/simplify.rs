//! Point thinning by local turning angle or inter-point distance.
//! Endpoints and user-locked points are always preserved.

use std::collections::HashSet;

use engravekit_core::Point;

/// Removes interior points whose local turning angle is below
/// `angle_threshold_deg`. Indices in `keep` are never removed.
pub fn simplify_by_angle(
    points: &[Point],
    angle_threshold_deg: f64,
    keep: &HashSet<usize>,
) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let threshold = angle_threshold_deg.to_radians();
    let mut out = vec![points[0]];
    let mut prev = points[0];
    for i in 1..points.len() - 1 {
        let p = points[i];
        let next = points[i + 1];
        if keep.contains(&i) {
            out.push(p);
            prev = p;
            continue;
        }
        let a_in = prev.angle_to(&p);
        let a_out = p.angle_to(&next);
        let mut turn = (a_out - a_in).abs() % std::f64::consts::TAU;
        if turn > std::f64::consts::PI {
            turn = std::f64::consts::TAU - turn;
        }
        if turn >= threshold {
            out.push(p);
            prev = p;
        }
    }
    out.push(*points.last().expect("len >= 3"));
    out
}

/// Removes points closer than `min_distance` to the last kept point.
/// Endpoints and indices in `keep` are never removed.
pub fn simplify_by_distance(
    points: &[Point],
    min_distance: f64,
    keep: &HashSet<usize>,
) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let p = points[i];
        if keep.contains(&i) || out.last().expect("non-empty").distance_to(&p) >= min_distance {
            out.push(p);
        }
    }
    out.push(*points.last().expect("len >= 3"));
    out
}
