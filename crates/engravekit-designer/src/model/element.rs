//! The element tree: a closed tagged union of every drawable kind, plus the
//! shared identity/name/enabled/properties envelope.

use std::sync::atomic::{AtomicU64, Ordering};

use lyon_geom::{CubicBezierSegment, LineSegment, QuadraticBezierSegment};
use serde::{Deserialize, Serialize};

use engravekit_core::geometry::{rotate_point, scale_point};
use engravekit_core::{Bounds, Point};

use super::EngravingProperties;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing element identifier.
///
/// Identifiers are never reused, not even across undo/redo: the counter is
/// process-wide, so restoring an old snapshot cannot rewind it. Preserving
/// clones (undo) keep ids; paste clones regenerate them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    /// Allocates the next identifier.
    pub fn next() -> Self {
        ElementId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One point of a [`PathData`] polyline with its segment tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub pos: Point,
    /// True when the segment arriving at this point is a rapid (G0) move.
    pub rapid: bool,
}

impl PathPoint {
    pub fn rapid(pos: Point) -> Self {
        Self { pos, rapid: true }
    }

    pub fn feed(pos: Point) -> Self {
        Self { pos, rapid: false }
    }
}

/// An ordered polyline with per-segment rapid/feed tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathData {
    pub points: Vec<PathPoint>,
}

impl PathData {
    /// Builds a feed polyline; the first point is tagged rapid.
    pub fn from_points(points: &[Point]) -> Self {
        let points = points
            .iter()
            .enumerate()
            .map(|(i, &p)| PathPoint {
                pos: p,
                rapid: i == 0,
            })
            .collect();
        Self { points }
    }

    /// Builds a closed feed polyline (appends the first point if needed).
    pub fn closed_from_points(points: &[Point]) -> Self {
        let mut data = Self::from_points(points);
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            if first.distance_to(last) > 1e-9 {
                data.points.push(PathPoint::feed(*first));
            }
        }
        data
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().map(|p| p.pos)
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().map(|p| p.pos)
    }

    /// First and last point coincide within 1e-6.
    pub fn is_closed(&self) -> bool {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) => self.points.len() > 2 && a.distance_to(&b) < 1e-6,
            _ => false,
        }
    }

    /// Reverses the point order, re-anchoring the rapid tags so each segment
    /// keeps its mode.
    pub fn reverse(&mut self) {
        if self.points.len() < 2 {
            return;
        }
        let tags: Vec<bool> = self.points.iter().map(|p| p.rapid).collect();
        self.points.reverse();
        let n = self.points.len();
        for (i, p) in self.points.iter_mut().enumerate() {
            // Segment tags travel with the segment, not the point.
            p.rapid = if i == 0 { true } else { tags[n - i] };
        }
    }

    /// Plain coordinate list.
    pub fn positions(&self) -> Vec<Point> {
        self.points.iter().map(|p| p.pos).collect()
    }
}

/// A circular arc: center, radius, start angle and signed angular length
/// (radians, positive = counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcData {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl ArcData {
    pub fn new(center: Point, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            sweep,
        }
    }

    /// Full circle starting at angle 0.
    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, 0.0, std::f64::consts::TAU)
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        Point::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    pub fn start_point(&self) -> Point {
        self.point_at_angle(self.start_angle)
    }

    pub fn end_point(&self) -> Point {
        self.point_at_angle(self.start_angle + self.sweep)
    }

    pub fn is_full_circle(&self) -> bool {
        self.sweep.abs() >= std::f64::consts::TAU - 1e-9
    }

    /// Swaps start and end, negating the sweep direction.
    pub fn reverse(&mut self) {
        self.start_angle += self.sweep;
        self.sweep = -self.sweep;
    }

    /// Polyline approximation with chord error below `tolerance`.
    /// Always includes both endpoints.
    pub fn sample(&self, tolerance: f64) -> Vec<Point> {
        let tol = tolerance.max(1e-6).min(self.radius.abs());
        let max_step = if self.radius.abs() < 1e-12 {
            self.sweep.abs().max(0.1)
        } else {
            2.0 * (1.0 - tol / self.radius.abs()).clamp(-1.0, 1.0).acos()
        };
        let steps = ((self.sweep.abs() / max_step.max(1e-4)).ceil() as usize).max(1);
        (0..=steps)
            .map(|i| {
                let a = self.start_angle + self.sweep * (i as f64 / steps as f64);
                self.point_at_angle(a)
            })
            .collect()
    }
}

/// A quadratic (3 control points) or cubic (4) Bezier segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineData {
    /// 3 or 4 control points; first and last are the endpoints.
    pub controls: Vec<Point>,
}

impl SplineData {
    pub fn quadratic(from: Point, ctrl: Point, to: Point) -> Self {
        Self {
            controls: vec![from, ctrl, to],
        }
    }

    pub fn cubic(from: Point, ctrl1: Point, ctrl2: Point, to: Point) -> Self {
        Self {
            controls: vec![from, ctrl1, ctrl2, to],
        }
    }

    pub fn is_cubic(&self) -> bool {
        self.controls.len() == 4
    }

    pub fn start_point(&self) -> Point {
        self.controls[0]
    }

    pub fn end_point(&self) -> Point {
        *self.controls.last().expect("spline has control points")
    }

    pub fn reverse(&mut self) {
        self.controls.reverse();
    }

    /// Flattens the curve under `tolerance`, endpoints included.
    pub fn sample(&self, tolerance: f64) -> Vec<Point> {
        let mut out = vec![self.start_point()];
        let mut push = |seg: &LineSegment<f64>| {
            out.push(Point::new(seg.to.x, seg.to.y));
        };
        if self.is_cubic() {
            CubicBezierSegment {
                from: to_lyon(self.controls[0]),
                ctrl1: to_lyon(self.controls[1]),
                ctrl2: to_lyon(self.controls[2]),
                to: to_lyon(self.controls[3]),
            }
            .for_each_flattened(tolerance, &mut push);
        } else {
            QuadraticBezierSegment {
                from: to_lyon(self.controls[0]),
                ctrl: to_lyon(self.controls[1]),
                to: to_lyon(self.controls[2]),
            }
            .for_each_flattened(tolerance, &mut push);
        }
        out
    }
}

fn to_lyon(p: Point) -> lyon_geom::Point<f64> {
    lyon_geom::Point::new(p.x, p.y)
}

/// One segment of a [`MixedPathData`]; every variant starts at the previous
/// segment's end point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MixedSegment {
    Line {
        to: Point,
    },
    /// The arc's start point must coincide with the running position.
    Arc(ArcData),
    Quadratic {
        ctrl: Point,
        to: Point,
    },
    Cubic {
        ctrl1: Point,
        ctrl2: Point,
        to: Point,
    },
}

impl MixedSegment {
    pub fn end_point(&self) -> Point {
        match self {
            MixedSegment::Line { to } => *to,
            MixedSegment::Arc(arc) => arc.end_point(),
            MixedSegment::Quadratic { to, .. } => *to,
            MixedSegment::Cubic { to, .. } => *to,
        }
    }
}

/// An ordered heterogeneous sequence of lines, arcs and splines sharing
/// continuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedPathData {
    pub start: Point,
    pub segments: Vec<MixedSegment>,
}

impl MixedPathData {
    pub fn new(start: Point) -> Self {
        Self {
            start,
            segments: Vec::new(),
        }
    }

    pub fn end_point(&self) -> Point {
        self.segments
            .last()
            .map(|s| s.end_point())
            .unwrap_or(self.start)
    }

    pub fn is_closed(&self) -> bool {
        !self.segments.is_empty() && self.start.distance_to(&self.end_point()) < 1e-6
    }

    /// Reverses the traversal direction, rebuilding every segment so its
    /// start point is the previous segment's end.
    pub fn reverse(&mut self) {
        let mut anchors = vec![self.start];
        for seg in &self.segments {
            anchors.push(seg.end_point());
        }
        let mut reversed = Vec::with_capacity(self.segments.len());
        for (i, seg) in self.segments.iter().enumerate().rev() {
            let from = anchors[i];
            reversed.push(match seg {
                MixedSegment::Line { .. } => MixedSegment::Line { to: from },
                MixedSegment::Arc(arc) => {
                    let mut arc = *arc;
                    arc.reverse();
                    MixedSegment::Arc(arc)
                }
                MixedSegment::Quadratic { ctrl, .. } => MixedSegment::Quadratic {
                    ctrl: *ctrl,
                    to: from,
                },
                MixedSegment::Cubic { ctrl1, ctrl2, .. } => MixedSegment::Cubic {
                    ctrl1: *ctrl2,
                    ctrl2: *ctrl1,
                    to: from,
                },
            });
        }
        self.start = *anchors.last().expect("anchors never empty");
        self.segments = reversed;
    }

    /// Polyline approximation under `tolerance`, endpoints included.
    pub fn sample(&self, tolerance: f64) -> Vec<Point> {
        let mut out = vec![self.start];
        let mut cursor = self.start;
        for seg in &self.segments {
            match seg {
                MixedSegment::Line { to } => out.push(*to),
                MixedSegment::Arc(arc) => {
                    out.extend(arc.sample(tolerance).into_iter().skip(1));
                }
                MixedSegment::Quadratic { ctrl, to } => {
                    let spline = SplineData::quadratic(cursor, *ctrl, *to);
                    out.extend(spline.sample(tolerance).into_iter().skip(1));
                }
                MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                    let spline = SplineData::cubic(cursor, *ctrl1, *ctrl2, *to);
                    out.extend(spline.sample(tolerance).into_iter().skip(1));
                }
            }
            cursor = seg.end_point();
        }
        out
    }
}

/// A pocket: the original closed outline plus the nested ring of inward
/// offsets produced by the pocketing algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketData {
    pub outline: PathData,
    pub rings: Vec<PathData>,
}

/// Text bound to a guide path: the pre-rendered glyph outlines plus the
/// target path they follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOnPathData {
    pub text: String,
    pub glyphs: Vec<MixedPathData>,
    pub guide: PathData,
}

/// Closed union of every element kind. Only `Group` owns children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Group(Vec<Element>),
    Path(PathData),
    Arc(ArcData),
    Spline(SplineData),
    MixedPath(MixedPathData),
    Drill(Point),
    TextOnPath(TextOnPathData),
    Pocket(PocketData),
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    pub name: String,
    pub enabled: bool,
    pub properties: EngravingProperties,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: ElementId::next(),
            name: name.into(),
            enabled: true,
            properties: EngravingProperties::default(),
            kind,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, ElementKind::Group(Vec::new()))
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The token used for this kind in the project format and diagnostics.
    pub fn kind_token(&self) -> &'static str {
        match &self.kind {
            ElementKind::Group(_) => "Group",
            ElementKind::Path(_) => "Path",
            ElementKind::Arc(_) => "Arc",
            ElementKind::Spline(_) => "Spline",
            ElementKind::MixedPath(_) => "Mixed",
            ElementKind::Drill(_) => "Drill",
            ElementKind::TextOnPath(_) => "Text",
            ElementKind::Pocket(_) => "Pocket",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ElementKind::Group(_))
    }

    pub fn children(&self) -> Option<&[Element]> {
        match &self.kind {
            ElementKind::Group(children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Element>> {
        match &mut self.kind {
            ElementKind::Group(children) => Some(children),
            _ => None,
        }
    }

    /// Empty containers and point-less leaves are pruned when editing exits.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            ElementKind::Group(children) => children.is_empty(),
            ElementKind::Path(path) => path.points.is_empty(),
            ElementKind::MixedPath(mixed) => mixed.segments.is_empty(),
            _ => false,
        }
    }

    /// Deep clone with fresh identifiers throughout (paste).
    pub fn with_regenerated_ids(&self) -> Element {
        let mut clone = self.clone();
        clone.regenerate_ids();
        clone
    }

    fn regenerate_ids(&mut self) {
        self.id = ElementId::next();
        if let ElementKind::Group(children) = &mut self.kind {
            for child in children {
                child.regenerate_ids();
            }
        }
    }

    /// True when the selection containing this element forces equal X/Y
    /// scale ratios (circular arcs cannot scale non-uniformly).
    pub fn uniform_scale_only(&self) -> bool {
        match &self.kind {
            ElementKind::Arc(_) | ElementKind::Drill(_) => true,
            ElementKind::MixedPath(mixed) => mixed
                .segments
                .iter()
                .any(|s| matches!(s, MixedSegment::Arc(_))),
            ElementKind::Pocket(_) => true,
            ElementKind::Group(children) => children.iter().any(|c| c.uniform_scale_only()),
            _ => false,
        }
    }

    /// Start and end point for open-ended primitives; `None` for groups,
    /// drills, closed paths and full circles.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        match &self.kind {
            ElementKind::Path(path) if !path.is_closed() => Some((path.first()?, path.last()?)),
            ElementKind::Arc(arc) if !arc.is_full_circle() => {
                Some((arc.start_point(), arc.end_point()))
            }
            ElementKind::Spline(spline) => Some((spline.start_point(), spline.end_point())),
            ElementKind::MixedPath(mixed) if !mixed.is_closed() && !mixed.segments.is_empty() => {
                Some((mixed.start, mixed.end_point()))
            }
            _ => None,
        }
    }

    /// True for closed outlines usable by pocketing and offsetting.
    pub fn is_closed(&self) -> bool {
        match &self.kind {
            ElementKind::Path(path) => path.is_closed(),
            ElementKind::Arc(arc) => arc.is_full_circle(),
            ElementKind::MixedPath(mixed) => mixed.is_closed(),
            _ => false,
        }
    }

    /// Reverses traversal direction where the kind has one.
    pub fn reverse(&mut self) {
        match &mut self.kind {
            ElementKind::Path(path) => path.reverse(),
            ElementKind::Arc(arc) => arc.reverse(),
            ElementKind::Spline(spline) => spline.reverse(),
            ElementKind::MixedPath(mixed) => mixed.reverse(),
            _ => {}
        }
    }

    // --- transforms -----------------------------------------------------

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.for_each_point(&mut |p| Point::new(p.x + dx, p.y + dy));
    }

    /// Rotates around `center` by `angle_deg` degrees.
    pub fn rotate_about(&mut self, center: Point, angle_deg: f64) {
        match &mut self.kind {
            ElementKind::Arc(arc) => {
                arc.center = rotate_point(arc.center, center, angle_deg);
                arc.start_angle += angle_deg.to_radians();
            }
            ElementKind::MixedPath(mixed) => {
                mixed.start = rotate_point(mixed.start, center, angle_deg);
                for seg in &mut mixed.segments {
                    match seg {
                        MixedSegment::Line { to } => *to = rotate_point(*to, center, angle_deg),
                        MixedSegment::Arc(arc) => {
                            arc.center = rotate_point(arc.center, center, angle_deg);
                            arc.start_angle += angle_deg.to_radians();
                        }
                        MixedSegment::Quadratic { ctrl, to } => {
                            *ctrl = rotate_point(*ctrl, center, angle_deg);
                            *to = rotate_point(*to, center, angle_deg);
                        }
                        MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                            *ctrl1 = rotate_point(*ctrl1, center, angle_deg);
                            *ctrl2 = rotate_point(*ctrl2, center, angle_deg);
                            *to = rotate_point(*to, center, angle_deg);
                        }
                    }
                }
            }
            ElementKind::Group(children) => {
                for child in children {
                    child.rotate_about(center, angle_deg);
                }
            }
            _ => self.for_each_point(&mut |p| rotate_point(p, center, angle_deg)),
        }
    }

    /// Scales away from `center`. Arcs (and anything containing one) must be
    /// given equal ratios; the caller enforces the aspect lock.
    pub fn scale_about(&mut self, center: Point, sx: f64, sy: f64) {
        match &mut self.kind {
            ElementKind::Arc(arc) => {
                arc.center = scale_point(arc.center, center, sx, sy);
                arc.radius *= sx.abs();
            }
            ElementKind::MixedPath(mixed) => {
                mixed.start = scale_point(mixed.start, center, sx, sy);
                for seg in &mut mixed.segments {
                    match seg {
                        MixedSegment::Line { to } => *to = scale_point(*to, center, sx, sy),
                        MixedSegment::Arc(arc) => {
                            arc.center = scale_point(arc.center, center, sx, sy);
                            arc.radius *= sx.abs();
                        }
                        MixedSegment::Quadratic { ctrl, to } => {
                            *ctrl = scale_point(*ctrl, center, sx, sy);
                            *to = scale_point(*to, center, sx, sy);
                        }
                        MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                            *ctrl1 = scale_point(*ctrl1, center, sx, sy);
                            *ctrl2 = scale_point(*ctrl2, center, sx, sy);
                            *to = scale_point(*to, center, sx, sy);
                        }
                    }
                }
            }
            ElementKind::Group(children) => {
                for child in children {
                    child.scale_about(center, sx, sy);
                }
            }
            _ => self.for_each_point(&mut |p| scale_point(p, center, sx, sy)),
        }
    }

    /// Applies `f` to every coordinate of the element. Arc center/radius and
    /// angle fields are handled by the dedicated transforms; this covers the
    /// pure point-bag kinds (and recurses into groups).
    fn for_each_point(&mut self, f: &mut dyn FnMut(Point) -> Point) {
        match &mut self.kind {
            ElementKind::Group(children) => {
                for child in children {
                    child.for_each_point(f);
                }
            }
            ElementKind::Path(path) => {
                for p in &mut path.points {
                    p.pos = f(p.pos);
                }
            }
            ElementKind::Arc(arc) => {
                arc.center = f(arc.center);
            }
            ElementKind::Spline(spline) => {
                for p in &mut spline.controls {
                    *p = f(*p);
                }
            }
            ElementKind::MixedPath(mixed) => {
                mixed.start = f(mixed.start);
                for seg in &mut mixed.segments {
                    match seg {
                        MixedSegment::Line { to } => *to = f(*to),
                        MixedSegment::Arc(arc) => arc.center = f(arc.center),
                        MixedSegment::Quadratic { ctrl, to } => {
                            *ctrl = f(*ctrl);
                            *to = f(*to);
                        }
                        MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                            *ctrl1 = f(*ctrl1);
                            *ctrl2 = f(*ctrl2);
                            *to = f(*to);
                        }
                    }
                }
            }
            ElementKind::Drill(p) => *p = f(*p),
            ElementKind::TextOnPath(text) => {
                for glyph in &mut text.glyphs {
                    glyph.start = f(glyph.start);
                    for seg in &mut glyph.segments {
                        match seg {
                            MixedSegment::Line { to } => *to = f(*to),
                            MixedSegment::Arc(arc) => arc.center = f(arc.center),
                            MixedSegment::Quadratic { ctrl, to } => {
                                *ctrl = f(*ctrl);
                                *to = f(*to);
                            }
                            MixedSegment::Cubic { ctrl1, ctrl2, to } => {
                                *ctrl1 = f(*ctrl1);
                                *ctrl2 = f(*ctrl2);
                                *to = f(*to);
                            }
                        }
                    }
                }
                for p in &mut text.guide.points {
                    p.pos = f(p.pos);
                }
            }
            ElementKind::Pocket(pocket) => {
                for p in &mut pocket.outline.points {
                    p.pos = f(p.pos);
                }
                for ring in &mut pocket.rings {
                    for p in &mut ring.points {
                        p.pos = f(p.pos);
                    }
                }
            }
        }
    }

    // --- point editing --------------------------------------------------

    /// Number of editable handles. Groups, pockets and text are opened as
    /// containers or left opaque; they expose no handles.
    pub fn point_count(&self) -> usize {
        match &self.kind {
            ElementKind::Path(path) => path.points.len(),
            // Center, start and end handles.
            ElementKind::Arc(_) => 3,
            ElementKind::Spline(spline) => spline.controls.len(),
            ElementKind::MixedPath(mixed) => {
                1 + mixed
                    .segments
                    .iter()
                    .map(|s| match s {
                        MixedSegment::Line { .. } | MixedSegment::Arc(_) => 1,
                        MixedSegment::Quadratic { .. } => 2,
                        MixedSegment::Cubic { .. } => 3,
                    })
                    .sum::<usize>()
            }
            ElementKind::Drill(_) => 1,
            _ => 0,
        }
    }

    /// Position of handle `index`, if it exists.
    pub fn point(&self, index: usize) -> Option<Point> {
        match &self.kind {
            ElementKind::Path(path) => path.points.get(index).map(|p| p.pos),
            ElementKind::Arc(arc) => match index {
                0 => Some(arc.center),
                1 => Some(arc.start_point()),
                2 => Some(arc.end_point()),
                _ => None,
            },
            ElementKind::Spline(spline) => spline.controls.get(index).copied(),
            ElementKind::MixedPath(mixed) => {
                if index == 0 {
                    return Some(mixed.start);
                }
                let mut i = 1;
                for seg in &mixed.segments {
                    let handles: &[Point] = match seg {
                        MixedSegment::Line { to } => &[*to],
                        MixedSegment::Arc(arc) => &[arc.end_point()],
                        MixedSegment::Quadratic { ctrl, to } => &[*ctrl, *to],
                        MixedSegment::Cubic { ctrl1, ctrl2, to } => &[*ctrl1, *ctrl2, *to],
                    };
                    if index < i + handles.len() {
                        return Some(handles[index - i]);
                    }
                    i += handles.len();
                }
                None
            }
            ElementKind::Drill(p) => (index == 0).then_some(*p),
            _ => None,
        }
    }

    /// All handle positions in index order.
    pub fn points(&self) -> Vec<Point> {
        (0..self.point_count())
            .filter_map(|i| self.point(i))
            .collect()
    }

    /// Moves handle `index` to `pos`. Returns false if the handle does not
    /// exist.
    pub fn set_point(&mut self, index: usize, pos: Point) -> bool {
        match &mut self.kind {
            ElementKind::Path(path) => {
                if let Some(p) = path.points.get_mut(index) {
                    p.pos = pos;
                    true
                } else {
                    false
                }
            }
            ElementKind::Arc(arc) => match index {
                0 => {
                    arc.center = pos;
                    true
                }
                1 => {
                    arc.radius = arc.center.distance_to(&pos);
                    arc.start_angle = arc.center.angle_to(&pos);
                    true
                }
                2 => {
                    let end_angle = arc.center.angle_to(&pos);
                    let mut sweep = end_angle - arc.start_angle;
                    // Keep the traversal direction.
                    if arc.sweep >= 0.0 {
                        while sweep < 0.0 {
                            sweep += std::f64::consts::TAU;
                        }
                    } else {
                        while sweep > 0.0 {
                            sweep -= std::f64::consts::TAU;
                        }
                    }
                    arc.sweep = sweep;
                    true
                }
                _ => false,
            },
            ElementKind::Spline(spline) => {
                if let Some(p) = spline.controls.get_mut(index) {
                    *p = pos;
                    true
                } else {
                    false
                }
            }
            ElementKind::MixedPath(mixed) => {
                if index == 0 {
                    mixed.start = pos;
                    return true;
                }
                let mut i = 1;
                for seg in &mut mixed.segments {
                    let n = match seg {
                        MixedSegment::Line { .. } | MixedSegment::Arc(_) => 1,
                        MixedSegment::Quadratic { .. } => 2,
                        MixedSegment::Cubic { .. } => 3,
                    };
                    if index < i + n {
                        let local = index - i;
                        match seg {
                            MixedSegment::Line { to } => *to = pos,
                            MixedSegment::Arc(arc) => {
                                let end_angle = arc.center.angle_to(&pos);
                                let mut sweep = end_angle - arc.start_angle;
                                if arc.sweep >= 0.0 {
                                    while sweep < 0.0 {
                                        sweep += std::f64::consts::TAU;
                                    }
                                } else {
                                    while sweep > 0.0 {
                                        sweep -= std::f64::consts::TAU;
                                    }
                                }
                                arc.sweep = sweep;
                            }
                            MixedSegment::Quadratic { ctrl, to } => {
                                if local == 0 {
                                    *ctrl = pos
                                } else {
                                    *to = pos
                                }
                            }
                            MixedSegment::Cubic { ctrl1, ctrl2, to } => match local {
                                0 => *ctrl1 = pos,
                                1 => *ctrl2 = pos,
                                _ => *to = pos,
                            },
                        }
                        return true;
                    }
                    i += n;
                }
                false
            }
            ElementKind::Drill(p) => {
                if index == 0 {
                    *p = pos;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Inserts a polyline point before `index`. Only paths support this.
    pub fn insert_point(&mut self, index: usize, pos: Point) -> bool {
        match &mut self.kind {
            ElementKind::Path(path) => {
                if index <= path.points.len() {
                    let rapid = index == 0 && path.points.is_empty();
                    path.points.insert(index, PathPoint { pos, rapid });
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Removes handle `index`. Paths remove the point; mixed paths remove
    /// the owning segment. Arc/spline handles cannot be removed (the
    /// primitive would degenerate).
    pub fn remove_point(&mut self, index: usize) -> bool {
        match &mut self.kind {
            ElementKind::Path(path) => {
                if index < path.points.len() {
                    path.points.remove(index);
                    if index == 0 {
                        if let Some(first) = path.points.first_mut() {
                            first.rapid = true;
                        }
                    }
                    true
                } else {
                    false
                }
            }
            ElementKind::MixedPath(mixed) => {
                if index == 0 {
                    if let Some(first) = mixed.segments.first() {
                        mixed.start = first.end_point();
                        mixed.segments.remove(0);
                        return true;
                    }
                    return false;
                }
                let mut i = 1;
                for (seg_idx, seg) in mixed.segments.iter().enumerate() {
                    let n = match seg {
                        MixedSegment::Line { .. } | MixedSegment::Arc(_) => 1,
                        MixedSegment::Quadratic { .. } => 2,
                        MixedSegment::Cubic { .. } => 3,
                    };
                    if index < i + n {
                        mixed.segments.remove(seg_idx);
                        return true;
                    }
                    i += n;
                }
                false
            }
            _ => false,
        }
    }

    // --- geometry queries ------------------------------------------------

    /// Polyline approximation of the element's outline(s) under `tolerance`.
    /// Groups return one polyline per leaf.
    pub fn sample_outlines(&self, tolerance: f64) -> Vec<Vec<Point>> {
        match &self.kind {
            ElementKind::Group(children) => children
                .iter()
                .flat_map(|c| c.sample_outlines(tolerance))
                .collect(),
            ElementKind::Path(path) => {
                if path.points.is_empty() {
                    Vec::new()
                } else {
                    vec![path.positions()]
                }
            }
            ElementKind::Arc(arc) => vec![arc.sample(tolerance)],
            ElementKind::Spline(spline) => vec![spline.sample(tolerance)],
            ElementKind::MixedPath(mixed) => vec![mixed.sample(tolerance)],
            ElementKind::Drill(p) => vec![vec![*p]],
            ElementKind::TextOnPath(text) => text
                .glyphs
                .iter()
                .map(|g| g.sample(tolerance))
                .collect(),
            ElementKind::Pocket(pocket) => {
                let mut out = vec![pocket.outline.positions()];
                out.extend(pocket.rings.iter().map(|r| r.positions()));
                out
            }
        }
    }

    /// Bounding box; `None` for empty containers.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for outline in self.sample_outlines(0.05) {
            for p in outline {
                match &mut bounds {
                    Some(b) => b.expand(p),
                    None => bounds = Some(Bounds::from_point(p)),
                }
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let a = Element::group("a");
        let b = Element::group("b");
        assert!(b.id().raw() > a.id().raw());
    }

    #[test]
    fn regenerated_clone_gets_fresh_ids() {
        let mut group = Element::group("g");
        group
            .children_mut()
            .unwrap()
            .push(Element::new("p", ElementKind::Drill(Point::new(0.0, 0.0))));
        let clone = group.with_regenerated_ids();
        assert_ne!(clone.id(), group.id());
        assert_ne!(
            clone.children().unwrap()[0].id(),
            group.children().unwrap()[0].id()
        );
        assert_eq!(clone.children().unwrap().len(), 1);
    }

    #[test]
    fn path_reverse_keeps_segment_tags() {
        let mut path = PathData::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ]);
        path.points[2].rapid = true;
        path.reverse();
        assert_eq!(path.points[0].pos, Point::new(2.0, 0.0));
        assert!(path.points[0].rapid);
        // The rapid 1->2 segment is now the 2->1 segment.
        assert!(path.points[1].rapid);
        assert!(!path.points[2].rapid);
    }

    #[test]
    fn arc_reverse_swaps_endpoints() {
        let mut arc = ArcData::new(Point::new(0.0, 0.0), 1.0, 0.0, std::f64::consts::PI);
        let (start, end) = (arc.start_point(), arc.end_point());
        arc.reverse();
        assert!(arc.start_point().distance_to(&end) < 1e-9);
        assert!(arc.end_point().distance_to(&start) < 1e-9);
    }

    #[test]
    fn mixed_reverse_preserves_endpoints() {
        let mut mixed = MixedPathData::new(Point::new(0.0, 0.0));
        mixed.segments.push(MixedSegment::Line {
            to: Point::new(1.0, 0.0),
        });
        mixed.segments.push(MixedSegment::Quadratic {
            ctrl: Point::new(2.0, 1.0),
            to: Point::new(3.0, 0.0),
        });
        let end = mixed.end_point();
        mixed.reverse();
        assert!(mixed.start.distance_to(&end) < 1e-9);
        assert!(mixed.end_point().distance_to(&Point::new(0.0, 0.0)) < 1e-9);
    }

    #[test]
    fn arc_end_handle_keeps_direction() {
        let mut el = Element::new(
            "a",
            ElementKind::Arc(ArcData::new(
                Point::new(0.0, 0.0),
                1.0,
                0.0,
                std::f64::consts::FRAC_PI_2,
            )),
        );
        assert!(el.set_point(2, Point::new(-1.0, 0.0)));
        if let ElementKind::Arc(arc) = &el.kind {
            assert!((arc.sweep - std::f64::consts::PI).abs() < 1e-9);
        } else {
            unreachable!();
        }
    }

    #[test]
    fn rotating_group_rotates_children() {
        let mut group = Element::group("g");
        group.children_mut().unwrap().push(Element::new(
            "d",
            ElementKind::Drill(Point::new(1.0, 0.0)),
        ));
        group.rotate_about(Point::new(0.0, 0.0), 90.0);
        let p = group.children().unwrap()[0].point(0).unwrap();
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
    }
}
