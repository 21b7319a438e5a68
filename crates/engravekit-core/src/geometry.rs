//! 2D geometry primitives and the distance/intersection math used by the
//! document model, the snap resolver and the derivation algorithms.

use serde::{Deserialize, Serialize};

/// Represents a 2D point with X and Y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point with the given X and Y coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculates the distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Linear interpolation towards `other` (`t` in 0..=1).
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Angle of the vector from `self` to `other`, in radians.
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Rotates a point around a center by an angle in degrees.
pub fn rotate_point(p: Point, center: Point, angle_deg: f64) -> Point {
    if angle_deg.abs() < 1e-12 {
        return p;
    }
    let angle_rad = angle_deg.to_radians();
    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    Point {
        x: center.x + dx * cos_a - dy * sin_a,
        y: center.y + dx * sin_a + dy * cos_a,
    }
}

/// Scales a point away from a center by separate X/Y ratios.
pub fn scale_point(p: Point, center: Point, sx: f64, sy: f64) -> Point {
    Point {
        x: center.x + (p.x - center.x) * sx,
        y: center.y + (p.y - center.y) * sy,
    }
}

/// Centroid of a point set. Returns `None` for an empty slice.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Closest point to `p` on the segment `a`-`b`.
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-18 {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * dx, a.y + t * dy)
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    p.distance_to(&closest_point_on_segment(p, a, b))
}

/// Intersection of the segments `a1`-`a2` and `b1`-`b2`, if the segments
/// properly cross. Parallel and collinear pairs return `None`.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let d1x = a2.x - a1.x;
    let d1y = a2.y - a1.y;
    let d2x = b2.x - b1.x;
    let d2y = b2.y - b1.y;
    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = ((b1.x - a1.x) * d2y - (b1.y - a1.y) * d2x) / denom;
    let u = ((b1.x - a1.x) * d1y - (b1.y - a1.y) * d1x) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(a1.x + t * d1x, a1.y + t * d1y))
    } else {
        None
    }
}

/// Cross product of the vectors `o`->`a` and `o`->`b`.
///
/// Positive when `a`-`b` turns counter-clockwise around `o`.
pub fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(p: Point) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Smallest box covering all points. `None` for an empty slice.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Bounds::from_point(*first);
        for p in &points[1..] {
            b.expand(*p);
        }
        Some(b)
    }

    /// Grows the box to include `p`.
    pub fn expand(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// True when `other` lies entirely inside `self` (closed comparison).
    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// True when `p` lies inside or on the box.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.midpoint(&b), Point::new(1.5, 2.0));
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = rotate_point(Point::new(1.0, 0.0), Point::new(0.0, 0.0), 90.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((distance_to_segment(Point::new(-3.0, 4.0), a, b) - 5.0).abs() < 1e-12);
        assert!((distance_to_segment(Point::new(5.0, 2.0), a, b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn crossing_segments_intersect() {
        let p = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert!((p.x - 5.0).abs() < 1e-12);
        assert!((p.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        assert!(segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(10.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn bounds_union_and_containment() {
        let a = Bounds::new(0.0, 0.0, 5.0, 5.0);
        let b = Bounds::new(2.0, 2.0, 3.0, 3.0);
        assert!(a.contains(&b));
        assert!(!b.contains(&a));
        assert_eq!(a.union(&b), a);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rotation_preserves_distance_to_center(
                x in -1e3..1e3f64,
                y in -1e3..1e3f64,
                cx in -1e3..1e3f64,
                cy in -1e3..1e3f64,
                angle in -720.0..720.0f64,
            ) {
                let p = Point::new(x, y);
                let c = Point::new(cx, cy);
                let q = rotate_point(p, c, angle);
                prop_assert!((c.distance_to(&p) - c.distance_to(&q)).abs() < 1e-6);
            }

            #[test]
            fn rotate_back_is_identity(
                x in -1e3..1e3f64,
                y in -1e3..1e3f64,
                angle in -360.0..360.0f64,
            ) {
                let p = Point::new(x, y);
                let c = Point::new(0.0, 0.0);
                let q = rotate_point(rotate_point(p, c, angle), c, -angle);
                prop_assert!(p.distance_to(&q) < 1e-6);
            }
        }
    }
}
