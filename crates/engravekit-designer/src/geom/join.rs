//! End-to-end concatenation of open elements.
//!
//! Two open elements join when any pairing of their endpoints lies within
//! the tolerance; the operands are reoriented so the second starts where
//! the first ends. Like kinds concatenate in place, unlike kinds are
//! promoted to a mixed path.

use engravekit_core::Point;

use crate::model::{Element, ElementKind, MixedPathData, MixedSegment, PathData};

/// Decomposes an open element into a start point plus mixed segments.
///
/// Returns `None` for groups, drills, closed elements and other kinds that
/// cannot take part in a join.
pub fn to_mixed_segments(element: &Element) -> Option<(Point, Vec<MixedSegment>)> {
    match &element.kind {
        ElementKind::Path(path) if !path.is_closed() => {
            let positions = path.positions();
            let (&start, rest) = positions.split_first()?;
            if rest.is_empty() {
                return None;
            }
            Some((
                start,
                rest.iter().map(|&to| MixedSegment::Line { to }).collect(),
            ))
        }
        ElementKind::Arc(arc) if !arc.is_full_circle() => {
            Some((arc.start_point(), vec![MixedSegment::Arc(*arc)]))
        }
        ElementKind::Spline(spline) => {
            let segment = if spline.is_cubic() {
                MixedSegment::Cubic {
                    ctrl1: spline.controls[1],
                    ctrl2: spline.controls[2],
                    to: spline.controls[3],
                }
            } else {
                MixedSegment::Quadratic {
                    ctrl: spline.controls[1],
                    to: spline.controls[2],
                }
            };
            Some((spline.start_point(), vec![segment]))
        }
        ElementKind::MixedPath(mixed) if !mixed.is_closed() => {
            Some((mixed.start, mixed.segments.clone()))
        }
        _ => None,
    }
}

/// Joins two open elements if any endpoint pairing lies within `epsilon`.
///
/// The operands are reversed as needed so that `b` continues from the end
/// of `a`; the closest qualifying pairing wins. The result carries `a`'s
/// name and properties. Returns `None` when no pairing qualifies or either
/// element is not joinable.
pub fn join_pair(a: &Element, b: &Element, epsilon: f64) -> Option<Element> {
    let (a_start, a_end) = a.endpoints()?;
    let (b_start, b_end) = b.endpoints()?;

    // (reverse a, reverse b) for each endpoint pairing.
    let pairings = [
        (a_end.distance_to(&b_start), false, false),
        (a_end.distance_to(&b_end), false, true),
        (a_start.distance_to(&b_start), true, false),
        (a_start.distance_to(&b_end), true, true),
    ];
    let (gap, flip_a, flip_b) = pairings
        .into_iter()
        .min_by(|x, y| x.0.partial_cmp(&y.0).expect("finite endpoint gap"))?;
    if gap > epsilon {
        return None;
    }

    let mut head = a.clone();
    let mut tail = b.clone();
    if flip_a {
        head.reverse();
    }
    if flip_b {
        tail.reverse();
    }

    let kind = match (&head.kind, &tail.kind) {
        (ElementKind::Path(first), ElementKind::Path(second)) => {
            let mut points = first.points.clone();
            // The shared point is represented once.
            points.extend(second.points.iter().skip(1).cloned());
            ElementKind::Path(PathData { points })
        }
        _ => {
            let (start, mut segments) = to_mixed_segments(&head)?;
            let (_, continuation) = to_mixed_segments(&tail)?;
            segments.extend(continuation);
            ElementKind::MixedPath(MixedPathData { start, segments })
        }
    };

    let mut joined = Element::new(head.name.clone(), kind);
    joined.enabled = head.enabled;
    joined.properties = head.properties;
    Some(joined)
}

/// Repeatedly joins elements pairwise until no two endpoints lie within
/// `epsilon`. Elements that never qualify pass through unchanged, in
/// order.
pub fn join_set(mut elements: Vec<Element>, epsilon: f64) -> Vec<Element> {
    loop {
        let mut found = None;
        'scan: for i in 0..elements.len() {
            for j in i + 1..elements.len() {
                if let Some(joined) = join_pair(&elements[i], &elements[j], epsilon) {
                    found = Some((i, j, joined));
                    break 'scan;
                }
            }
        }
        match found {
            Some((i, j, joined)) => {
                elements.remove(j);
                elements[i] = joined;
            }
            None => return elements,
        }
    }
}
